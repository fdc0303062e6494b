use crate::error::Result;
use mdcm::workflows::scan::Scan;

pub fn run() -> Result<()> {
    Scan::print_documentation();
    Ok(())
}
