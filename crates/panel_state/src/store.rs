use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::PanelStateError;
use crate::schema::PanelState;

/// File-backed panel flag. A missing file reads as closed.
#[derive(Debug)]
pub struct PanelStateStore {
    path: PathBuf,
    state: PanelState,
}

impl PanelStateStore {
    pub fn open(path: &Path) -> Result<Self, PanelStateError> {
        let path = path.to_path_buf();
        let state = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => PanelState::default(),
            Ok(contents) => {
                let state = serde_json::from_str::<PanelState>(&contents)
                    .map_err(|source| PanelStateError::json_parse(&path, source))?;
                if let Some(value) = &state.last_opened_at {
                    validate_rfc3339(&path, "lastOpenedAt", value)?;
                }
                state
            }
            Err(source) if source.kind() == ErrorKind::NotFound => PanelState::default(),
            Err(source) => {
                return Err(PanelStateError::io("reading panel state", &path, source));
            }
        };

        Ok(Self { path, state })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn state(&self) -> &PanelState {
        &self.state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.open
    }

    /// Flips the flag and persists it. Returns the new value.
    pub fn toggle(&mut self) -> Result<bool, PanelStateError> {
        let open = !self.state.open;
        self.set_open(open)?;
        Ok(open)
    }

    /// Persists `open`, stamping `lastOpenedAt` on every transition to open.
    pub fn set_open(&mut self, open: bool) -> Result<(), PanelStateError> {
        let mut next = self.state.clone();
        if open && !next.open {
            next.last_opened_at = Some(now_rfc3339()?);
        }
        next.open = open;

        write_atomic(&self.path, &next)?;
        self.state = next;
        Ok(())
    }
}

fn write_atomic(path: &Path, state: &PanelState) -> Result<(), PanelStateError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|source| PanelStateError::io("creating panel state directory", parent, source))?;
    }

    let body = serde_json::to_string_pretty(state)
        .map_err(|source| PanelStateError::json_serialize(path, source))?;

    let tmp_path = path.with_file_name(format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        uuid::Uuid::new_v4().simple()
    ));
    fs::write(&tmp_path, body)
        .map_err(|source| PanelStateError::io("writing panel state", &tmp_path, source))?;
    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        PanelStateError::io("replacing panel state", path, source)
    })
}

fn now_rfc3339() -> Result<String, PanelStateError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(PanelStateError::ClockFormat)
}

fn validate_rfc3339(path: &Path, field: &'static str, value: &str) -> Result<(), PanelStateError> {
    if OffsetDateTime::parse(value, &Rfc3339).is_err() {
        return Err(PanelStateError::InvalidTimestamp {
            path: path.to_path_buf(),
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}
