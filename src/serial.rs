// ABOUTME: Opens the modem's serial device and splits it into transport halves

use tokio::io::{self, ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

pub type SerialReader = ReadHalf<SerialStream>;
pub type SerialWriter = WriteHalf<SerialStream>;

/// Open `path` at `baud` and split it for the command channel.
///
/// 8N1 framing, the serial default, matches what the modems speak.
pub fn open(path: &str, baud: u32) -> tokio_serial::Result<(SerialReader, SerialWriter)> {
    let stream = tokio_serial::new(path, baud).open_native_async()?;
    Ok(io::split(stream))
}
