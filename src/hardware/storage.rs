use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{constants::LOG_BUFFER_SIZE, errors::RigError};

use super::Storage;

/// Log files and tables under a root directory.
pub struct FileStorage {
    root: PathBuf,
    file: Option<File>,
    file_name: Option<String>,
    buffer: String,
    max_buffer_size: usize,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStorage {
            root: root.into(),
            file: None,
            file_name: None,
            buffer: String::new(),
            max_buffer_size: LOG_BUFFER_SIZE,
        }
    }

    pub fn with_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current_file(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn unique_file_name(&self, prefix: &str) -> String {
        let mut index = 0_u32;
        loop {
            let name = format!("{}_{}.txt", prefix, index);
            if !self.root.join(&name).exists() {
                return name;
            }
            index += 1;
        }
    }

    fn io_error(context: &str, error: std::io::Error) -> RigError {
        RigError::Storage(format!("{}: {}", context, error))
    }
}

impl Storage for FileStorage {
    fn create_file(&mut self, header: &str, prefix: &str) -> Result<String, RigError> {
        // Close out any previous session before switching files
        self.flush()?;

        fs::create_dir_all(&self.root)
            .map_err(|e| Self::io_error(&self.root.display().to_string(), e))?;

        let name = self.unique_file_name(prefix);
        let path = self.root.join(&name);
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|e| Self::io_error(&name, e))?;

        writeln!(file, "{}", header).map_err(|e| Self::io_error(&name, e))?;
        file.flush().map_err(|e| Self::io_error(&name, e))?;

        debug!("Opened log file {}", path.display());
        self.file = Some(file);
        self.file_name = Some(name.clone());
        Ok(name)
    }

    fn append_buffered(&mut self, line: &str) -> Result<(), RigError> {
        if self.file.is_none() {
            return Err(RigError::Storage("no log file open".to_string()));
        }

        self.buffer.push_str(line);
        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RigError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        if self.buffer.is_empty() {
            return Ok(());
        }

        file.write_all(self.buffer.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| RigError::Storage(format!("flush failed: {}", e)))?;
        self.buffer.clear();
        Ok(())
    }

    fn load_table(&mut self, path: &str) -> Result<String, RigError> {
        let full_path = self.root.join(path);
        fs::read_to_string(&full_path)
            .map_err(|e| Self::io_error(&full_path.display().to_string(), e))
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Dropping unflushed log data: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "flight_chamber_storage_{}_{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_unique_file_names() {
        let dir = scratch_dir();
        let mut storage = FileStorage::new(&dir);

        let first = storage.create_file("state,time,pressure", "cal").unwrap();
        let second = storage.create_file("state,time,pressure", "cal").unwrap();

        assert_eq!(first, "cal_0.txt");
        assert_eq!(second, "cal_1.txt");
        let contents = fs::read_to_string(dir.join(&first)).unwrap();
        assert_eq!(contents, "state,time,pressure\n");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_buffer_flushes_when_full() {
        let dir = scratch_dir();
        let mut storage = FileStorage::new(&dir).with_buffer_size(32);
        let name = storage.create_file("header", "run").unwrap();

        storage.append_buffered("ground,0.00,101325.0\n").unwrap();
        assert_eq!(
            fs::read_to_string(dir.join(&name)).unwrap(),
            "header\n",
            "Short lines should stay buffered"
        );

        storage.append_buffered("ground,0.10,101320.0\n").unwrap();
        assert_eq!(storage.buffered_len(), 0);
        let contents = fs::read_to_string(dir.join(&name)).unwrap();
        assert_eq!(contents.lines().count(), 3);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_append_without_file_fails() {
        let mut storage = FileStorage::new(scratch_dir());
        assert!(matches!(
            storage.append_buffered("x\n"),
            Err(RigError::Storage(_))
        ));
    }

    #[test]
    fn test_drop_flushes_buffer() {
        let dir = scratch_dir();
        let name = {
            let mut storage = FileStorage::new(&dir);
            let name = storage.create_file("header", "cal").unwrap();
            storage.append_buffered("leaking,12.30,95000.0\n").unwrap();
            name
        };
        let contents = fs::read_to_string(dir.join(&name)).unwrap();
        assert!(contents.ends_with("leaking,12.30,95000.0\n"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_table() {
        let dir = scratch_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("gains.csv"), "1,0,0,1000\n").unwrap();

        let mut storage = FileStorage::new(&dir);
        assert_eq!(storage.load_table("gains.csv").unwrap(), "1,0,0,1000\n");
        assert!(matches!(
            storage.load_table("missing.csv"),
            Err(RigError::Storage(_))
        ));

        let _ = fs::remove_dir_all(&dir);
    }
}
