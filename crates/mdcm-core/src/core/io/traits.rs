use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing a file format.
///
/// Implementors handle format-specific parsing and serialization of a single
/// in-memory representation (`Self::Data`) together with format metadata that
/// has no place in that representation (comment lines, headers).
pub trait FormatFile {
    /// The in-memory representation produced by the reader.
    type Data;

    /// The type of metadata associated with the file format.
    type Metadata;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads data and metadata from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<(Self::Data, Self::Metadata), Self::Error>;

    /// Writes data and metadata to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(
        data: &Self::Data,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    /// Reads data and metadata from a file path.
    fn read_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<(Self::Data, Self::Metadata), Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes data and metadata to a file path, creating or truncating it.
    fn write_to_path<P: AsRef<Path>>(
        data: &Self::Data,
        metadata: &Self::Metadata,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(data, metadata, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
