// Credential store
//
// Reads and writes the zypp-style credential file consumed by the package
// stack: `username=` / `password=` lines plus an optional rotating
// `system_token=`. A missing file is the normal first-run state and is
// classified separately from a file that exists but cannot be parsed, so
// callers can decide between re-announcing and aborting.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Directory holding per-service credential files.
pub const DEFAULT_CREDENTIALS_DIR: &str = "/etc/zypp/credentials.d";

/// The system identity created by announce.
pub const SYSTEM_CREDENTIALS_FILE: &str = "/etc/zypp/credentials.d/SCCcredentials";

/// Login/password identity of an announced system.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    /// Server-rotated per-system token, echoed on every request.
    pub system_token: Option<String>,
    /// Path this identity was read from, if any.
    pub path: Option<PathBuf>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"REDACTED")
            .field("system_token", &self.system_token)
            .field("path", &self.path)
            .finish()
    }
}

impl Credentials {
    pub fn new(login: &str, password: &str) -> Self {
        Self {
            login: login.to_owned(),
            password: password.to_owned(),
            system_token: None,
            path: None,
        }
    }
}

/// Path of the system credentials file under an optional filesystem root.
pub fn system_credentials_path(fs_root: Option<&Path>) -> PathBuf {
    match fs_root {
        Some(root) => root.join(SYSTEM_CREDENTIALS_FILE.trim_start_matches('/')),
        None => PathBuf::from(SYSTEM_CREDENTIALS_FILE),
    }
}

/// Path of a named service credentials file under an optional root.
pub fn service_credentials_path(service: &str, fs_root: Option<&Path>) -> PathBuf {
    let dir = match fs_root {
        Some(root) => root.join(DEFAULT_CREDENTIALS_DIR.trim_start_matches('/')),
        None => PathBuf::from(DEFAULT_CREDENTIALS_DIR),
    };
    dir.join(service)
}

/// Read credentials from `path`.
///
/// Returns [`Error::MissingCredentialsFile`] when the file does not exist
/// and [`Error::MalformedCredentialsFile`] when it exists but does not
/// contain both `username` and `password` keys.
pub fn read(path: &Path) -> Result<Credentials, Error> {
    tracing::debug!("reading credentials from {}", path.display());
    if !path.exists() {
        return Err(Error::MissingCredentialsFile {
            path: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let mut creds = parse(&content).ok_or_else(|| Error::MalformedCredentialsFile {
        path: path.display().to_string(),
    })?;
    creds.path = Some(path.to_owned());
    Ok(creds)
}

fn parse(content: &str) -> Option<Credentials> {
    let mut login = None;
    let mut password = None;
    let mut system_token = None;

    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if value.is_empty() || value.contains(char::is_whitespace) {
            continue;
        }
        match key {
            "username" => login = Some(value.to_owned()),
            "password" => password = Some(value.to_owned()),
            "system_token" => system_token = Some(value.to_owned()),
            _ => {}
        }
    }

    Some(Credentials {
        login: login?,
        password: password?,
        system_token,
        path: None,
    })
}

/// Write credentials to `path`, creating parent directories as needed.
///
/// The write is atomic (temp file in the target directory, then rename) so
/// concurrent readers never observe a partially written file. On unix the
/// file is owner-only (0600).
pub fn write(
    login: &str,
    password: &str,
    system_token: Option<&str>,
    path: &Path,
) -> Result<(), Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut content = format!("username={login}\npassword={password}\n");
    if let Some(token) = system_token {
        if !token.is_empty() {
            content.push_str(&format!("system_token={token}\n"));
        }
    }

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tmp.as_file().set_permissions(perms)?;
    }

    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_login_and_password() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("SCCcredentials");

        write("SCC_0815", "opensesame", None, &path).expect("write");
        let creds = read(&path).expect("read");

        assert_eq!(creds.login, "SCC_0815");
        assert_eq!(creds.password, "opensesame");
        assert_eq!(creds.system_token, None);
        assert_eq!(creds.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn round_trips_system_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("SCCcredentials");

        write("SCC_0815", "opensesame", Some("tok-123"), &path).expect("write");
        let creds = read(&path).expect("read");
        assert_eq!(creds.system_token.as_deref(), Some("tok-123"));
    }

    #[test]
    fn missing_file_is_its_own_error_kind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read(&dir.path().join("nope")).expect_err("must fail");
        assert!(matches!(err, Error::MissingCredentialsFile { .. }));
    }

    #[test]
    fn malformed_file_is_distinguished_from_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("SCCcredentials");
        std::fs::write(&path, "<html>proxy login page</html>").expect("seed");

        let err = read(&path).expect_err("must fail");
        assert!(matches!(err, Error::MalformedCredentialsFile { .. }));
    }

    #[test]
    fn partial_content_does_not_parse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("SCCcredentials");
        std::fs::write(&path, "username=SCC_0815\n").expect("seed");

        let err = read(&path).expect_err("must fail");
        assert!(matches!(err, Error::MalformedCredentialsFile { .. }));
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("SCCcredentials");

        write("old", "old", None, &path).expect("write");
        write("new", "new", None, &path).expect("overwrite");
        let creds = read(&path).expect("read");
        assert_eq!(creds.login, "new");
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("etc/zypp/credentials.d/SCCcredentials");

        write("SCC_0815", "opensesame", None, &path).expect("write");
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("SCCcredentials");
        write("SCC_0815", "opensesame", None, &path).expect("write");

        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn paths_respect_fs_root() {
        let rooted = system_credentials_path(Some(Path::new("/mnt/target")));
        assert_eq!(
            rooted,
            PathBuf::from("/mnt/target/etc/zypp/credentials.d/SCCcredentials")
        );
        let service = service_credentials_path("basesystem", None);
        assert_eq!(
            service,
            PathBuf::from("/etc/zypp/credentials.d/basesystem")
        );
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("SCC_0815", "opensesame");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("opensesame"));
    }
}
