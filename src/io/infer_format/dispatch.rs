use std::fs;
use std::io::{self, BufReader};
use std::path::Path;

use log::debug;

use super::inference::file_name_of;
use super::registry::FormatRegistry;
use crate::error::{PeakListError, Result};
use crate::io::compression::{open_compressed_reader, CompressedPeakListWriter, Compression};
use crate::io::traits::{BoxedPeakListReader, BoxedPeakListWriter};
use crate::io::transcode::open_transcoded_reader;
use crate::io::utils::PreBufferedStream;

impl FormatRegistry {
    /// Open a reader for the file at `path`.
    ///
    /// A compression envelope recognized by the file name is unwrapped first,
    /// once, into scratch space. Registered transcoders are consulted next, then
    /// the plain readers. Readers over scratch files delete them when closed.
    pub fn open_reader<P: AsRef<Path>>(&self, path: P) -> Result<BoxedPeakListReader> {
        let path = path.as_ref();
        if let Some((compression, inner_name)) = Compression::from_path(path) {
            debug!(
                "Unwrapping {} envelope of {}",
                compression.name(),
                path.display()
            );
            return open_compressed_reader(self, path, compression, &inner_name, self.scratch_space());
        }
        if let Some(descriptor) = self.lookup_transcoder(path) {
            return open_transcoded_reader(self, path, descriptor, self.scratch_space());
        }
        self.open_plain_reader(path)
    }

    /// Open `path` with a reader directly, no envelopes or transcoders
    pub(crate) fn open_plain_reader(&self, path: &Path) -> Result<BoxedPeakListReader> {
        let descriptor = self.lookup_reader(path)?;
        let handle = fs::File::open(path)?;
        let handle = BufReader::with_capacity(self.config.buffer_size, handle);
        (descriptor.factory)(Box::new(handle))
    }

    /// Open a reader over `stream`, using `name` in place of a file name.
    ///
    /// Compressed or transcoded streams are copied into scratch space first, as
    /// their content has to be unpacked before it can be read. A compressed stream
    /// is recognized by its name, or by its magic bytes when the name says nothing.
    pub fn open_reader_from_stream<R: io::Read + Send + 'static>(
        &self,
        name: &str,
        stream: R,
    ) -> Result<BoxedPeakListReader> {
        let mut stream = PreBufferedStream::new_with_buffer_size(stream, self.config.buffer_size)?;
        let file_name = file_name_of(Path::new(name));

        let compression = Compression::from_file_name(&file_name).or_else(|| {
            Compression::from_magic(stream.prefix()).map(|c| (c, file_name.clone()))
        });
        if let Some((compression, inner_name)) = compression {
            let mut scratch = self.scratch_space();
            let dir = scratch.create_dir()?;
            let copy = dir.join(format!("{inner_name}{}", compression.suffix()));
            let n = io::copy(&mut stream, &mut fs::File::create(&copy)?)?;
            debug!("Copied {n} bytes of {} stream {name} to scratch", compression.name());
            return open_compressed_reader(self, &copy, compression, &inner_name, scratch);
        }

        if let Some(descriptor) = self.lookup_transcoder(&file_name) {
            let mut scratch = self.scratch_space();
            let dir = scratch.create_dir()?;
            let copy = dir.join(&file_name);
            io::copy(&mut stream, &mut fs::File::create(&copy)?)?;
            return open_transcoded_reader(self, &copy, descriptor, scratch);
        }

        let descriptor = self.lookup_reader_for_stream(name, &stream)?;
        debug!("Reading stream {name} as {}", descriptor.name);
        let handle = BufReader::with_capacity(self.config.buffer_size, stream);
        (descriptor.factory)(Box::new(handle))
    }

    /// Create a writer for `path`, chosen by its file name. A compression suffix
    /// makes the writer compress its output into `path` when it is closed.
    pub fn create_writer<P: AsRef<Path>>(&self, path: P) -> Result<BoxedPeakListWriter> {
        let path = path.as_ref();
        if let Some((compression, inner_name)) = Compression::from_path(path) {
            let writer = CompressedPeakListWriter::create(self, path, compression, &inner_name)?;
            return Ok(Box::new(writer));
        }
        let descriptor = self.lookup_writer(path)?;
        let handle = fs::File::create(path)?;
        (descriptor.factory)(Box::new(handle))
    }

    /// Create a writer over `stream`, using `name` in place of a file name.
    ///
    /// Compressed output needs a file destination, so a compressed `name` is
    /// rejected with [`PeakListError::IncompatibleFormat`].
    pub fn create_writer_to_stream<W: io::Write + Send + 'static>(
        &self,
        name: &str,
        stream: W,
    ) -> Result<BoxedPeakListWriter> {
        if let Some((compression, _)) = Compression::from_file_name(name) {
            return Err(PeakListError::incompatible(
                compression.name(),
                "compressed output can only be written to a file",
            ));
        }
        let descriptor = self.lookup_writer(name)?;
        debug!("Writing stream {name} as {}", descriptor.name);
        (descriptor.factory)(Box::new(stream))
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;
    use crate::io::traits::{PeakListReader, PeakListWriter};
    use crate::peaks::{Peak, PeakList, PeakListDescription};

    fn sample() -> PeakList {
        let mut description = PeakListDescription::default();
        description.parent_mz = Some(445.12);
        description.parent_charge = Some(2);
        PeakList::new(
            description,
            vec![Peak::new(101.5, 10.0), Peak::new(202.25, 20.0)],
        )
    }

    #[test_log::test]
    fn test_open_and_create_by_path() -> Result<()> {
        let registry = FormatRegistry::default();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sample.pkl");

        let mut writer = registry.create_writer(&path)?;
        assert_eq!(writer.format_name(), "PKL");
        writer.write_peak_list(&sample())?;
        writer.close()?;

        let mut reader = registry.open_reader(&path)?;
        let peak_list = reader.get_peak_list(false, false)?.unwrap();
        assert_eq!(peak_list.len(), 2);
        assert_eq!(peak_list.description.parent_charge, Some(2));
        assert!(reader.get_peak_list(false, false)?.is_none());
        reader.close()?;
        Ok(())
    }

    #[test_log::test]
    fn test_unknown_format_names_the_file() -> Result<()> {
        let registry = FormatRegistry::default();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sample.abc");
        fs::write(&path, "nothing to see\n")?;
        match registry.open_reader(&path) {
            Err(PeakListError::UnknownFormat(name)) => assert!(name.contains("sample.abc")),
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("expected an error"),
        }
        assert!(matches!(
            registry.create_writer(dir.path().join("out.abc")),
            Err(PeakListError::UnknownFormat(_))
        ));
        Ok(())
    }

    #[test_log::test]
    fn test_streams() -> Result<()> {
        let registry = FormatRegistry::default();
        let mut writer = registry.create_writer_to_stream("peaks.xy", Vec::new())?;
        writer.write_peak(&Peak::new(100.0, 1.0))?;
        writer.close()?;

        let mut reader =
            registry.open_reader_from_stream("peaks.xy", io::Cursor::new(b"100.0 1.0\n150.0 2.0\n".to_vec()))?;
        let peak_list = reader.get_peak_list(false, false)?.unwrap();
        assert_eq!(peak_list.len(), 2);
        assert_eq!(peak_list.description.source_format.as_deref(), Some("XY"));

        assert!(matches!(
            registry.create_writer_to_stream("peaks.mgf.gz", Vec::new()),
            Err(PeakListError::IncompatibleFormat { format, .. }) if format == "gzip"
        ));
        Ok(())
    }

    #[test_log::test]
    fn test_compressed_stream_by_magic() -> Result<()> {
        let registry = FormatRegistry::default();
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"300.5 7.0\n")?;
        let packed = encoder.finish()?;

        let mut reader = registry.open_reader_from_stream("peaks.xy", io::Cursor::new(packed))?;
        let peak_list = reader.get_peak_list(false, false)?.unwrap();
        assert_eq!(peak_list.peaks, vec![Peak::new(300.5, 7.0)]);
        reader.close()?;
        Ok(())
    }
}
