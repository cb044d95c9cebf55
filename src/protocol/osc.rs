// OSC transport over UDP
//
// One connected UDP socket per pipeline run; each parameter update goes out
// as a single-argument OSC message. Send failures are logged and dropped:
// the receiver may simply not be listening yet, and the stream is lossy by
// design of the protocol underneath.

use rosc::{encoder, OscMessage, OscPacket, OscType};
use std::net::UdpSocket;
use tracing::debug;

use crate::error::PipelineError;
use crate::protocol::encoding::{ParamUpdate, ParamValue};

/// Outbound parameter sink.
///
/// Implementations must not block the analysis thread for longer than a
/// datagram send.
pub trait ParamTransport: Send {
    fn send(&self, update: &ParamUpdate);
}

/// OSC-over-UDP transport.
pub struct OscTransport {
    socket: UdpSocket,
}

impl OscTransport {
    /// Bind an ephemeral local socket and connect it to the receiver.
    pub fn connect(host: &str, port: u16) -> Result<Self, PipelineError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect((host, port))?;
        Ok(Self { socket })
    }
}

impl ParamTransport for OscTransport {
    fn send(&self, update: &ParamUpdate) {
        let arg = match update.value {
            ParamValue::Int(v) => OscType::Int(v),
            ParamValue::Float(v) => OscType::Float(v),
        };
        let packet = OscPacket::Message(OscMessage {
            addr: update.addr.clone(),
            args: vec![arg],
        });
        let bytes = match encoder::encode(&packet) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!("dropping unencodable OSC message {}: {}", update.addr, err);
                return;
            }
        };
        if let Err(err) = self.socket.send(&bytes) {
            debug!("OSC send to {} failed: {}", update.addr, err);
        }
    }
}
