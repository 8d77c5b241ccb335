//! Serial transport
//!
//! Opens the CUL stick, runs the MAX! mode handshake and frames the byte
//! stream into lines. Everything above this module only sees `AsyncRead` and
//! `AsyncWrite` halves, so tests drive the stack over in-memory pipes.

use serialport::{SerialPortInfo, SerialPortType};
use std::collections::HashMap;
use std::future::Future;
#[cfg(target_os = "linux")]
use std::fs;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info};

use super::{ProtocolError, MAX_LINE_LENGTH};
use crate::device::Address;

/// USB vendor id of busware, maker of the CUL sticks
pub const BUSWARE_VID: u16 = 0x03eb;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyACM0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,

    /// Serial number (if available)
    pub serial_number: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }

    /// Whether this looks like a CUL stick (busware vendor id or CUL product name)
    pub fn is_cul_candidate(&self) -> bool {
        self.vid == Some(BUSWARE_VID)
            || self
                .product
                .as_deref()
                .is_some_and(|p| p.to_ascii_uppercase().contains("CUL"))
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, manufacturer, product, serial_number) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => (
                Some(usb_info.vid),
                Some(usb_info.pid),
                usb_info.manufacturer,
                usb_info.product,
                usb_info.serial_number,
            ),
            _ => (None, None, None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            manufacturer,
            product,
            serial_number,
        }
    }
}

/// Sort key so that:
///  - CUL candidates come first
///  - then ttyACM* ports (sorted numerically by suffix)
///  - then ttyUSB* ports (sorted numerically)
///  - then other ports (sorted by name)
fn port_sort_key(port: &PortInfo) -> (bool, u8, usize, String) {
    let name = port.name.as_str();
    let basename = name.rsplit('/').next().unwrap_or(name);
    let not_cul = !port.is_cul_candidate();
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (not_cul, 0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (not_cul, 1, num, basename.to_string());
    }
    (not_cul, 2, 0, basename.to_string())
}

/// List available serial ports, CUL candidates first
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // Linux-only: CUL sticks enumerate as ttyACM, which the API can miss
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(port_sort_key);
    v
}

/// Open the CUL stick (8N1, no flow control)
pub fn open_port(path: &str, baud_rate: u32) -> Result<SerialStream, ProtocolError> {
    debug!(port = path, baud_rate, "opening serial port");
    tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| ProtocolError::ConnectionFailed(format!("{}: {}", path, e)))
}

/// Frame a byte stream into lines (`\n` delimited, `\r` stripped)
pub fn line_reader<R: AsyncRead>(reader: R) -> FramedRead<R, LinesCodec> {
    FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH))
}

/// Write one command line and drain it to the port
pub async fn write_command<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

/// Delays of the startup handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeTiming {
    /// Wait after opening before the first command
    pub settle: Duration,
    /// Wait after the version query before switching modes
    pub version_settle: Duration,
    /// How long to wait for the firmware version line
    pub ready_timeout: Duration,
}

impl Default for HandshakeTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            version_settle: Duration::from_secs(4),
            ready_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of the startup handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeOutcome {
    /// The stick answered with its firmware version in time
    pub firmware_confirmed: bool,
}

/// Put the stick into MAX! mode
///
/// Queries the version, enables MAX! mode (`X20`), RSSI reporting (`Zr`) and
/// sets the base address (`Za<base>`). Then waits for `ready`, which resolves
/// once the firmware version line has been seen. A stick that stays silent is
/// not an error: the link runs degraded and the outcome says so.
pub async fn handshake<W, F>(
    writer: &mut W,
    base_address: Address,
    ready: F,
    timing: HandshakeTiming,
) -> io::Result<HandshakeOutcome>
where
    W: AsyncWrite + Unpin + ?Sized,
    F: Future<Output = bool>,
{
    tokio::time::sleep(timing.settle).await;
    write_command(writer, "V\n").await?;
    tokio::time::sleep(timing.version_settle).await;

    write_command(writer, "X20\n").await?;
    write_command(writer, "Zr\n").await?;
    write_command(writer, &format!("Za{}\n", base_address)).await?;
    debug!(%base_address, "CUL switched to MAX! mode");

    let firmware_confirmed = match tokio::time::timeout(timing.ready_timeout, ready).await {
        Ok(confirmed) => confirmed,
        Err(_) => false,
    };
    if !firmware_confirmed {
        info!("CUL available but not responding, continuing without firmware version");
    }
    Ok(HandshakeOutcome { firmware_confirmed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::io::AsyncReadExt;

    fn port(name: &str) -> PortInfo {
        PortInfo::bare(name.to_string())
    }

    #[test]
    fn test_list_ports() {
        // Just ensures enumeration doesn't panic
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_port_sorting() {
        let mut cul = port("/dev/ttyACM3");
        cul.vid = Some(BUSWARE_VID);
        let mut ports = vec![
            port("/dev/ttyUSB1"),
            port("/dev/ttyACM1"),
            port("/dev/someport"),
            cul,
            port("/dev/ttyACM0"),
        ];

        ports.sort_by_key(port_sort_key);
        let ordered: Vec<String> = ports.into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyACM3",
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/ttyUSB1",
                "/dev/someport",
            ]
        );
    }

    #[test]
    fn test_cul_candidate_by_product() {
        let mut p = port("COM4");
        p.product = Some("busware CUL V3".to_string());
        assert!(p.is_cul_candidate());
        assert!(!port("COM1").is_cul_candidate());
    }

    #[tokio::test]
    async fn test_line_reader_strips_carriage_return() {
        let (mut tx, rx) = tokio::io::duplex(64);
        tx.write_all(b"V 1.67 CUL868\r\n250 7\n").await.unwrap();
        drop(tx);

        let lines: Vec<String> = line_reader(rx).map(|l| l.unwrap()).collect().await;
        assert_eq!(lines, vec!["V 1.67 CUL868", "250 7"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_sequence() {
        let (mut writer, mut reader) = tokio::io::duplex(256);
        let base: Address = "123456".parse().unwrap();

        let outcome = handshake(&mut writer, base, async { true }, HandshakeTiming::default())
            .await
            .unwrap();
        assert!(outcome.firmware_confirmed);
        drop(writer);

        let mut written = String::new();
        reader.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "V\nX20\nZr\nZa123456\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_degraded_on_silence() {
        let (mut writer, _reader) = tokio::io::duplex(256);
        let base: Address = "123456".parse().unwrap();
        let started = tokio::time::Instant::now();

        let outcome = handshake(
            &mut writer,
            base,
            std::future::pending::<bool>(),
            HandshakeTiming::default(),
        )
        .await
        .unwrap();

        assert!(!outcome.firmware_confirmed);
        assert!(started.elapsed() >= Duration::from_secs(36));
    }
}
