//! One-shot checks that a log file can be used before a writer commits to it.

use crate::error::{FileError, FileErrorKind};
use crate::sink::SinkDescriptor;
use crate::status::StatusSink;
use std::ffi::CString;
use std::fs::{self, OpenOptions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Make sure the file described by `descriptor` can be used as a log file.
///
/// * an existing file is rejected unless `overwrite` is set, in which case it is checked for the
///   required access modes;
/// * missing parent directories are created;
/// * finally the file is opened (truncated if `overwrite` is set) and closed again, to make sure
///   nothing else is holding on to it.
///
/// Nothing is created or modified if the file exists and `overwrite` is not set.
pub fn validate(descriptor: &SinkDescriptor, status: &dyn StatusSink) -> Result<(), FileError> {
    let path = descriptor.path.as_path();

    status.info(0, &format!("Validating {}", path.display()));

    if path.exists() {
        status.warn(1, "File exists");

        if !descriptor.overwrite {
            return Err(FileError::new(
                FileErrorKind::AlreadyExists,
                path,
                "file already exists, cannot overwrite",
            ));
        }
        status.warn(1, "Will try to overwrite");

        if descriptor.require_writable {
            check_access(path, Access::Write)?;
            status.ok(1, "File writable");
        }

        if descriptor.require_readable {
            check_access(path, Access::Read)?;
            status.ok(1, "File readable");
        }

        if descriptor.require_executable {
            check_access(path, Access::Execute)?;
            status.ok(1, "File executable");
        }
    } else {
        status.warn(1, "File does not exist");

        match path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            Some(dir) if !dir.exists() => {
                fs::create_dir_all(dir).map_err(|e| {
                    FileError::with_source(
                        FileErrorKind::NotWritable,
                        path,
                        format!("cannot create directory {}", dir.display()),
                        e,
                    )
                })?;
                status.ok(1, "Created the missing parent directories");
            }
            _ => status.ok(1, "Parent directories already exist"),
        }
    }

    probe(path, descriptor.overwrite)?;
    status.ok(1, "File good to go");

    Ok(())
}

/// Open the file for writing and release it immediately.
fn probe(path: &Path, overwrite: bool) -> Result<(), FileError> {
    let mut options = OpenOptions::new();
    options.create(true);

    if overwrite {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }

    options
        .open(path)
        .map(drop)
        .map_err(|e| FileError::with_source(FileErrorKind::InUse, path, "cannot open file", e))
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Write,
    Execute,
}

impl Access {
    fn mode(self) -> libc::c_int {
        match self {
            Access::Read => libc::R_OK,
            Access::Write => libc::W_OK,
            Access::Execute => libc::X_OK,
        }
    }

    fn error_kind(self) -> FileErrorKind {
        match self {
            Access::Read => FileErrorKind::NotReadable,
            Access::Write => FileErrorKind::NotWritable,
            Access::Execute => FileErrorKind::NotExecutable,
        }
    }
}

/// Check `path` against the real user's permissions using `access(2)`.
fn check_access(path: &Path, access: Access) -> Result<(), FileError> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| {
        FileError::with_source(
            access.error_kind(),
            path,
            "path contains a NUL byte",
            io::Error::new(io::ErrorKind::InvalidInput, e),
        )
    })?;

    let res = unsafe { libc::access(c_path.as_ptr(), access.mode()) };

    if res < 0 {
        let kind = access.error_kind();
        let message = match kind {
            FileErrorKind::NotReadable => "file not readable",
            FileErrorKind::NotExecutable => "file not executable",
            _ => "file not writable",
        };

        return Err(FileError::with_source(
            kind,
            path,
            message,
            io::Error::last_os_error(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{Level, NullStatus, RecordingStatus};
    use std::os::unix::fs::PermissionsExt;

    fn is_root() -> bool {
        unsafe { libc::geteuid() == 0 }
    }

    #[test]
    fn existing_file_without_overwrite_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "keep me\n").unwrap();
        let modified = fs::metadata(&path).unwrap().modified().unwrap();

        let err = validate(&SinkDescriptor::new(&path), &NullStatus).unwrap_err();

        assert_eq!(err.kind(), FileErrorKind::AlreadyExists);
        assert_eq!(err.path(), path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me\n");
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn existing_file_with_overwrite_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "old\n").unwrap();

        validate(&SinkDescriptor::new(&path).with_overwrite(true), &NullStatus).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c/keys.txt");
        let status = RecordingStatus::new();

        validate(&SinkDescriptor::new(&path), &status).unwrap();

        assert!(dir.path().join("a/b/c").is_dir());
        assert!(path.is_file());
        assert!(status
            .messages(Level::Ok)
            .contains(&"Created the missing parent directories".to_owned()));
    }

    #[test]
    fn existing_parent_directory_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        let status = RecordingStatus::new();

        validate(&SinkDescriptor::new(&path), &status).unwrap();

        assert!(path.is_file());
        assert!(status
            .messages(Level::Ok)
            .contains(&"Parent directories already exist".to_owned()));
    }

    #[test]
    fn uncreatable_parent_is_not_writable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let path = blocker.join("sub/keys.txt");

        let err = validate(&SinkDescriptor::new(&path), &NullStatus).unwrap_err();

        assert_eq!(err.kind(), FileErrorKind::NotWritable);
        assert!(err.io_error().is_some());
    }

    #[test]
    fn directory_cannot_be_opened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-file");
        fs::create_dir(&path).unwrap();

        let descriptor = SinkDescriptor::new(&path)
            .with_overwrite(true)
            .require_writable(false);
        let err = validate(&descriptor, &NullStatus).unwrap_err();

        assert_eq!(err.kind(), FileErrorKind::InUse);
        assert!(err.io_error().is_some());
    }

    #[test]
    fn read_only_file_is_not_writable() {
        // root bypasses the permission bits
        if is_root() {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();

        let err = validate(&SinkDescriptor::new(&path).with_overwrite(true), &NullStatus)
            .unwrap_err();

        assert_eq!(err.kind(), FileErrorKind::NotWritable);
    }

    #[test]
    fn write_only_file_is_not_readable() {
        // root bypasses the permission bits
        if is_root() {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o200)).unwrap();

        let descriptor = SinkDescriptor::new(&path)
            .with_overwrite(true)
            .require_readable(true);
        let err = validate(&descriptor, &NullStatus).unwrap_err();

        assert_eq!(err.kind(), FileErrorKind::NotReadable);
        assert!(err.io_error().is_some());
    }

    #[test]
    fn failed_access_check_reports_the_checked_mode() {
        // A regular file in the middle of the path fails with ENOTDIR, even for root
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let path = blocker.join("keys.txt");

        let write = check_access(&path, Access::Write).unwrap_err();
        assert_eq!(write.kind(), FileErrorKind::NotWritable);
        assert_eq!(write.message(), "file not writable");
        assert_eq!(
            write.io_error().and_then(io::Error::raw_os_error),
            Some(libc::ENOTDIR)
        );

        let read = check_access(&path, Access::Read).unwrap_err();
        assert_eq!(read.kind(), FileErrorKind::NotReadable);
        assert_eq!(read.message(), "file not readable");
    }

    #[test]
    fn non_executable_file_is_rejected_when_required() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let descriptor = SinkDescriptor::new(&path)
            .with_overwrite(true)
            .require_executable(true);
        let err = validate(&descriptor, &NullStatus).unwrap_err();

        assert_eq!(err.kind(), FileErrorKind::NotExecutable);
    }

    #[test]
    fn readable_file_passes_read_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "").unwrap();
        let status = RecordingStatus::new();

        let descriptor = SinkDescriptor::new(&path)
            .with_overwrite(true)
            .require_readable(true);
        validate(&descriptor, &status).unwrap();

        let ok = status.messages(Level::Ok);
        assert!(ok.contains(&"File writable".to_owned()));
        assert!(ok.contains(&"File readable".to_owned()));
    }
}
