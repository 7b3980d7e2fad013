//! Customized upload server settings.
//!
//! The gateway keeps the settings in two records, read and written with
//! separate commands. `CMD_READ_CUSTOMIZED` carries the credentials and
//! endpoint:
//!
//! ```text
//! <id len> <id> <password len> <password> <server len> <server>
//! <port (2)> <interval (2)> <protocol> <enabled>
//! ```
//!
//! and `CMD_READ_USR_PATH` carries the upload path for each protocol:
//!
//! ```text
//! <ecowitt path len> <ecowitt path> <wunderground path len> <wunderground path>
//! ```
//!
//! [`CustomServerInfo`] merges the two.

use std::fmt;
use std::str::FromStr;

use bytes::BufMut;
use gwlib_core::{ProtocolError, ValidationError};

use crate::commands::Command;
use crate::frame;
use crate::reader::Reader;

/// Shortest upload interval the gateway accepts, in seconds.
pub const MIN_UPLOAD_INTERVAL: u16 = 16;

/// Upload intervals must stay below this, in seconds.
pub const MAX_UPLOAD_INTERVAL: u16 = 3600;

/// Longest string field a record can carry.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Longest combined id, password, and server text that fits one
/// `CMD_WRITE_CUSTOMIZED` payload (three length bytes plus six fixed bytes).
pub const MAX_SETTINGS_TEXT_LEN: usize = frame::MAX_PAYLOAD_LEN - 9;

/// Longest combined path text that fits one `CMD_WRITE_USR_PATH` payload.
pub const MAX_PATHS_TEXT_LEN: usize = frame::MAX_PAYLOAD_LEN - 2;

/// Upload protocol of the customized server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadProtocol {
    Ecowitt,
    Wunderground,
}

impl UploadProtocol {
    fn from_byte(b: u8) -> Self {
        if b == 1 {
            UploadProtocol::Wunderground
        } else {
            UploadProtocol::Ecowitt
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            UploadProtocol::Ecowitt => 0,
            UploadProtocol::Wunderground => 1,
        }
    }
}

impl fmt::Display for UploadProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadProtocol::Ecowitt => f.write_str("ecowitt"),
            UploadProtocol::Wunderground => f.write_str("wunderground"),
        }
    }
}

impl FromStr for UploadProtocol {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ecowitt" => Ok(UploadProtocol::Ecowitt),
            "wunderground" => Ok(UploadProtocol::Wunderground),
            _ => Err(ValidationError::new(
                "protocol",
                format!("must be 'wunderground' or 'ecowitt', got '{s}'"),
            )),
        }
    }
}

/// Customized upload server settings, merged from both records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomServerInfo {
    /// Station id presented to the server.
    pub id: String,
    /// Station key presented to the server.
    pub password: String,
    /// Server host name or address.
    pub server: String,
    pub port: u16,
    /// Upload interval in seconds.
    pub interval: u16,
    pub protocol: UploadProtocol,
    pub enabled: bool,
    pub ecowitt_path: String,
    pub wunderground_path: String,
}

impl CustomServerInfo {
    /// Check the record can be written back to the gateway.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_interval(i64::from(self.interval))?;
        validate_settings_text([
            ("id", Some(self.id.as_str())),
            ("password", Some(self.password.as_str())),
            ("server", Some(self.server.as_str())),
        ])?;
        validate_paths_text([
            ("ecowitt_path", Some(self.ecowitt_path.as_str())),
            ("wunderground_path", Some(self.wunderground_path.as_str())),
        ])
    }

    /// The upload path used with the configured protocol.
    pub fn active_path(&self) -> &str {
        match self.protocol {
            UploadProtocol::Ecowitt => &self.ecowitt_path,
            UploadProtocol::Wunderground => &self.wunderground_path,
        }
    }
}

fn validate_interval(interval: i64) -> Result<u16, ValidationError> {
    if interval < i64::from(MIN_UPLOAD_INTERVAL) || interval >= i64::from(MAX_UPLOAD_INTERVAL) {
        return Err(ValidationError::new(
            "interval",
            format!(
                "must be >= {MIN_UPLOAD_INTERVAL} and < {MAX_UPLOAD_INTERVAL} seconds, got {interval}"
            ),
        ));
    }
    Ok(interval as u16)
}

/// Check that the text fields of one write payload fit the frame together.
///
/// The error names the field whose bytes push the total over `max`.
fn validate_text_budget(
    fields: &[(&'static str, Option<&str>)],
    max: usize,
    group: &str,
) -> Result<(), ValidationError> {
    let total: usize = fields.iter().filter_map(|(_, v)| *v).map(str::len).sum();
    if total <= max {
        return Ok(());
    }

    let mut running = 0;
    let mut culprit = fields[0].0;
    for &(field, value) in fields {
        if let Some(value) = value {
            running += value.len();
            if running > max {
                culprit = field;
                break;
            }
        }
    }
    Err(ValidationError::new(
        culprit,
        format!("{group} must total at most {max} bytes, got {total}"),
    ))
}

fn validate_settings_text(
    fields: [(&'static str, Option<&str>); 3],
) -> Result<(), ValidationError> {
    validate_text_budget(&fields, MAX_SETTINGS_TEXT_LEN, "id, password and server")
}

fn validate_paths_text(
    fields: [(&'static str, Option<&str>); 2],
) -> Result<(), ValidationError> {
    validate_text_budget(&fields, MAX_PATHS_TEXT_LEN, "the upload paths")
}

fn validate_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_FIELD_LEN {
        return Err(ValidationError::new(
            field,
            format!("must be at most {MAX_FIELD_LEN} bytes, got {}", value.len()),
        ));
    }
    Ok(())
}

/// A partial change to the upload server settings.
///
/// `protocol` is free text so the caller's value is checked here, naming
/// the `protocol` field on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomServerInfoUpdate {
    pub id: Option<String>,
    pub password: Option<String>,
    pub server: Option<String>,
    pub port: Option<i64>,
    pub interval: Option<i64>,
    pub protocol: Option<String>,
    pub enabled: Option<bool>,
    pub ecowitt_path: Option<String>,
    pub wunderground_path: Option<String>,
}

impl CustomServerInfoUpdate {
    /// Check the supplied fields, before anything is read from the gateway.
    ///
    /// Text fields are checked against the room they leave in their write
    /// payload. Fields not supplied here come from the gateway and are
    /// checked again once merged.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_settings_text([
            ("id", self.id.as_deref()),
            ("password", self.password.as_deref()),
            ("server", self.server.as_deref()),
        ])?;
        validate_paths_text([
            ("ecowitt_path", self.ecowitt_path.as_deref()),
            ("wunderground_path", self.wunderground_path.as_deref()),
        ])?;
        if let Some(port) = self.port {
            validate_port(port)?;
        }
        if let Some(interval) = self.interval {
            validate_interval(interval)?;
        }
        if let Some(protocol) = &self.protocol {
            protocol.parse::<UploadProtocol>()?;
        }
        Ok(())
    }

    /// Overlay the supplied fields on `current` and validate the result.
    pub fn apply(&self, current: CustomServerInfo) -> Result<CustomServerInfo, ValidationError> {
        let mut merged = current;
        if let Some(id) = &self.id {
            merged.id = id.clone();
        }
        if let Some(password) = &self.password {
            merged.password = password.clone();
        }
        if let Some(server) = &self.server {
            merged.server = server.clone();
        }
        if let Some(port) = self.port {
            merged.port = validate_port(port)?;
        }
        if let Some(interval) = self.interval {
            merged.interval = validate_interval(interval)?;
        }
        if let Some(protocol) = &self.protocol {
            merged.protocol = protocol.parse()?;
        }
        if let Some(enabled) = self.enabled {
            merged.enabled = enabled;
        }
        if let Some(path) = &self.ecowitt_path {
            merged.ecowitt_path = path.clone();
        }
        if let Some(path) = &self.wunderground_path {
            merged.wunderground_path = path.clone();
        }
        merged.validate()?;
        Ok(merged)
    }
}

fn validate_port(port: i64) -> Result<u16, ValidationError> {
    u16::try_from(port)
        .ok()
        .filter(|&p| p != 0)
        .ok_or_else(|| ValidationError::new("port", format!("must be from 1 to 65535, got {port}")))
}

/// Decode validated `CMD_READ_CUSTOMIZED` and `CMD_READ_USR_PATH` replies.
pub fn decode_custom_server(
    customized: &[u8],
    user_path: &[u8],
) -> Result<CustomServerInfo, ProtocolError> {
    let mut r = Reader::new(
        frame::body(customized, Command::ReadCustomized)?,
        "custom server record",
    );
    let id = r.short_string()?;
    let password = r.short_string()?;
    let server = r.short_string()?;
    let port = r.u16()?;
    let interval = r.u16()?;
    let protocol = UploadProtocol::from_byte(r.u8()?);
    let enabled = r.u8()? != 0;

    let mut r = Reader::new(frame::body(user_path, Command::ReadUserPath)?, "user path record");
    let ecowitt_path = r.short_string()?;
    let wunderground_path = r.short_string()?;

    Ok(CustomServerInfo {
        id,
        password,
        server,
        port,
        interval,
        protocol,
        enabled,
        ecowitt_path,
        wunderground_path,
    })
}

fn put_short_string(buf: &mut Vec<u8>, field: &'static str, value: &str) -> Result<(), ValidationError> {
    validate_text(field, value)?;
    buf.put_u8(value.len() as u8);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Encode the `CMD_WRITE_CUSTOMIZED` payload.
pub fn encode_custom_server(info: &CustomServerInfo) -> Result<Vec<u8>, ValidationError> {
    validate_settings_text([
        ("id", Some(info.id.as_str())),
        ("password", Some(info.password.as_str())),
        ("server", Some(info.server.as_str())),
    ])?;
    let mut buf = Vec::with_capacity(info.id.len() + info.password.len() + info.server.len() + 9);
    put_short_string(&mut buf, "id", &info.id)?;
    put_short_string(&mut buf, "password", &info.password)?;
    put_short_string(&mut buf, "server", &info.server)?;
    buf.put_u16(info.port);
    buf.put_u16(info.interval);
    buf.put_u8(info.protocol.to_byte());
    buf.put_u8(u8::from(info.enabled));
    Ok(buf)
}

/// Encode the `CMD_WRITE_USR_PATH` payload.
pub fn encode_user_path(info: &CustomServerInfo) -> Result<Vec<u8>, ValidationError> {
    validate_paths_text([
        ("ecowitt_path", Some(info.ecowitt_path.as_str())),
        ("wunderground_path", Some(info.wunderground_path.as_str())),
    ])?;
    let mut buf = Vec::with_capacity(info.ecowitt_path.len() + info.wunderground_path.len() + 2);
    put_short_string(&mut buf, "ecowitt_path", &info.ecowitt_path)?;
    put_short_string(&mut buf, "wunderground_path", &info.wunderground_path)?;
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_info() -> CustomServerInfo {
        CustomServerInfo {
            id: "station".into(),
            password: "secret".into(),
            server: "wx.example.org".into(),
            port: 8080,
            interval: 60,
            protocol: UploadProtocol::Ecowitt,
            enabled: true,
            ecowitt_path: "/data/report/".into(),
            wunderground_path: "/weatherstation/updateweatherstation.php?".into(),
        }
    }

    /// Replies for `info` as the gateway would send them.
    pub(crate) fn server_replies(info: &CustomServerInfo) -> (Vec<u8>, Vec<u8>) {
        let customized = frame::encode_response(
            Command::ReadCustomized,
            &encode_custom_server(info).unwrap(),
        )
        .unwrap();
        let path = frame::encode_response(Command::ReadUserPath, &encode_user_path(info).unwrap())
            .unwrap();
        (customized, path)
    }

    #[test]
    fn decode_merges_both_records() {
        let (customized, path) = server_replies(&sample_info());
        let info = decode_custom_server(&customized, &path).unwrap();
        assert_eq!(info, sample_info());
        assert_eq!(info.active_path(), "/data/report/");
    }

    #[test]
    fn encode_layout() {
        let payload = encode_custom_server(&sample_info()).unwrap();
        assert_eq!(payload[0], 7);
        assert_eq!(&payload[1..8], b"station");
        let tail = &payload[payload.len() - 6..];
        assert_eq!(tail, &[0x1F, 0x90, 0x00, 0x3C, 0x00, 0x01]);
    }

    #[test]
    fn truncated_record() {
        let customized = frame::encode_response(Command::ReadCustomized, &[5, b'a']).unwrap();
        let (_, path) = server_replies(&sample_info());
        assert!(matches!(
            decode_custom_server(&customized, &path),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn protocol_parse() {
        assert_eq!(
            "Wunderground".parse::<UploadProtocol>().unwrap(),
            UploadProtocol::Wunderground
        );
        assert_eq!("foo".parse::<UploadProtocol>().unwrap_err().field, "protocol");
    }

    #[test]
    fn update_validation_names_fields() {
        let update = CustomServerInfoUpdate {
            protocol: Some("foo".into()),
            ..Default::default()
        };
        assert_eq!(update.validate().unwrap_err().field, "protocol");

        for bad in [15, 3600, -1] {
            let update = CustomServerInfoUpdate {
                interval: Some(bad),
                ..Default::default()
            };
            assert_eq!(update.validate().unwrap_err().field, "interval");
        }

        let update = CustomServerInfoUpdate {
            port: Some(70_000),
            ..Default::default()
        };
        assert_eq!(update.validate().unwrap_err().field, "port");

        let update = CustomServerInfoUpdate {
            server: Some("x".repeat(256)),
            ..Default::default()
        };
        assert_eq!(update.validate().unwrap_err().field, "server");
    }

    #[test]
    fn text_fields_must_fit_one_payload() {
        // Each field is short enough on its own, but not together.
        let update = CustomServerInfoUpdate {
            id: Some("i".repeat(130)),
            password: Some("p".repeat(130)),
            ..Default::default()
        };
        let err = update.validate().unwrap_err();
        assert_eq!(err.field, "password");
        assert!(err.reason.contains("243"));

        let update = CustomServerInfoUpdate {
            ecowitt_path: Some("/".repeat(200)),
            wunderground_path: Some("/".repeat(60)),
            ..Default::default()
        };
        assert_eq!(update.validate().unwrap_err().field, "wunderground_path");

        // Exactly at the limit still encodes into a frame.
        let info = CustomServerInfo {
            id: "i".repeat(120),
            password: "p".repeat(120),
            server: "s".repeat(MAX_SETTINGS_TEXT_LEN - 240),
            ..sample_info()
        };
        info.validate().unwrap();
        let payload = encode_custom_server(&info).unwrap();
        assert_eq!(payload.len(), frame::MAX_PAYLOAD_LEN);
        frame::encode_frame(Command::WriteCustomized, Some(&payload)).unwrap();
    }

    #[test]
    fn merged_text_overflow_names_the_field() {
        // Fits on its own, overflows with the gateway's server name.
        let update = CustomServerInfoUpdate {
            id: Some("i".repeat(120)),
            password: Some("p".repeat(120)),
            ..Default::default()
        };
        update.validate().unwrap();
        let err = update.apply(sample_info()).unwrap_err();
        assert_eq!(err.field, "server");
    }

    #[test]
    fn update_overlays_and_validates_merged_record() {
        let update = CustomServerInfoUpdate {
            protocol: Some("wunderground".into()),
            interval: Some(16),
            ..Default::default()
        };
        let merged = update.apply(sample_info()).unwrap();
        assert_eq!(merged.protocol, UploadProtocol::Wunderground);
        assert_eq!(merged.interval, 16);
        assert_eq!(merged.id, "station");

        // The device's own interval is checked too once merged.
        let current = CustomServerInfo {
            interval: 0,
            ..sample_info()
        };
        let err = CustomServerInfoUpdate::default().apply(current).unwrap_err();
        assert_eq!(err.field, "interval");
    }
}
