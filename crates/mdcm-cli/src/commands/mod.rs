pub mod doc;
pub mod fit;
pub mod scan;
