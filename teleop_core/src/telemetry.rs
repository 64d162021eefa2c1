//! Pose + state snapshots moved from the glove side to the robot side.
//!
//! On the wire a message is the ordered JSON array
//! `[x, y, z, gripper_request, movement_enabled, terminate]`, one per UDP
//! datagram. Delivery is best effort and most-recent-wins on both
//! transports.
use crate::error::{Result, TeleopError};
use crate::mailbox::{MailboxReceiver, MailboxSender, Wait};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

type Wire = (f64, f64, f64, bool, bool, bool);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Wire", into = "Wire")]
pub struct TelemetryMessage {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub gripper_request: bool,
    pub movement_enabled: bool,
    pub terminate: bool,
}

impl From<Wire> for TelemetryMessage {
    fn from((x, y, z, gripper_request, movement_enabled, terminate): Wire) -> Self {
        Self {
            x,
            y,
            z,
            gripper_request,
            movement_enabled,
            terminate,
        }
    }
}

impl From<TelemetryMessage> for Wire {
    fn from(m: TelemetryMessage) -> Self {
        (
            m.x,
            m.y,
            m.z,
            m.gripper_request,
            m.movement_enabled,
            m.terminate,
        )
    }
}

impl TelemetryMessage {
    pub fn new(position: [f64; 3], gripper_request: bool, movement_enabled: bool) -> Self {
        Self {
            x: position[0],
            y: position[1],
            z: position[2],
            gripper_request,
            movement_enabled,
            terminate: false,
        }
    }

    /// Final message of a session, carrying the last held position.
    pub fn terminate_at(position: [f64; 3]) -> Self {
        Self {
            terminate: true,
            ..Self::new(position, false, false)
        }
    }

    #[inline]
    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| TeleopError::Transport(format!("encode telemetry: {e}")).into())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| TeleopError::Transport(format!("decode telemetry: {e}")).into())
    }
}

/// What a subscriber saw within its wait budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Received {
    Message(TelemetryMessage),
    TimedOut,
    /// The publishing side is known to be gone.
    Closed,
}

pub trait Publish {
    fn publish(&mut self, msg: &TelemetryMessage) -> Result<()>;
}

pub trait Subscribe {
    /// Wait up to `timeout` (forever when `None`) and return the newest
    /// message, dropping any older unread ones.
    fn recv_latest(&mut self, timeout: Option<Duration>) -> Result<Received>;
}

impl Publish for MailboxSender<TelemetryMessage> {
    fn publish(&mut self, msg: &TelemetryMessage) -> Result<()> {
        MailboxSender::publish(self, *msg);
        Ok(())
    }
}

impl Subscribe for MailboxReceiver<TelemetryMessage> {
    fn recv_latest(&mut self, timeout: Option<Duration>) -> Result<Received> {
        let got = match timeout {
            Some(t) => self.recv_timeout(t),
            None => self.recv().map_or(Wait::Closed, Wait::Value),
        };
        Ok(match got {
            Wait::Value(m) => Received::Message(m),
            Wait::TimedOut => Received::TimedOut,
            Wait::Closed => Received::Closed,
        })
    }
}

const MAX_DATAGRAM: usize = 512;

pub struct UdpPublisher {
    socket: UdpSocket,
    target: SocketAddr,
    sent: u64,
}

impl UdpPublisher {
    pub fn connect(target: impl ToSocketAddrs) -> Result<Self> {
        let target = target
            .to_socket_addrs()
            .map_err(|e| TeleopError::Transport(format!("resolve publish target: {e}")))?
            .next()
            .ok_or_else(|| TeleopError::Transport("publish target resolved to nothing".into()))?;
        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind)
            .map_err(|e| TeleopError::Transport(format!("bind publisher socket: {e}")))?;
        tracing::debug!(%target, "telemetry publisher ready");
        Ok(Self {
            socket,
            target,
            sent: 0,
        })
    }

    #[inline]
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Publish for UdpPublisher {
    fn publish(&mut self, msg: &TelemetryMessage) -> Result<()> {
        let bytes = msg.encode()?;
        self.socket
            .send_to(&bytes, self.target)
            .map_err(|e| TeleopError::Transport(format!("send telemetry: {e}")))?;
        self.sent += 1;
        Ok(())
    }
}

pub struct UdpSubscriber {
    socket: UdpSocket,
    buf: [u8; MAX_DATAGRAM],
    malformed: u64,
    dropped: u64,
}

impl UdpSubscriber {
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .map_err(|e| TeleopError::Transport(format!("bind subscriber socket: {e}")))?;
        if let Ok(local) = socket.local_addr() {
            tracing::debug!(%local, "telemetry subscriber listening");
        }
        Ok(Self {
            socket,
            buf: [0; MAX_DATAGRAM],
            malformed: 0,
            dropped: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| TeleopError::Transport(format!("local addr: {e}")).into())
    }

    /// Datagrams that did not decode.
    #[inline]
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Valid messages skipped because a newer one was already queued.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn decode_current(&mut self, len: usize) -> Option<TelemetryMessage> {
        match TelemetryMessage::decode(&self.buf[..len]) {
            Ok(m) => Some(m),
            Err(e) => {
                self.malformed += 1;
                tracing::warn!(error = %e, len, "skipping malformed telemetry datagram");
                None
            }
        }
    }

    /// Read everything already queued without blocking; keep the newest.
    fn drain(&mut self, mut latest: Option<TelemetryMessage>) -> Result<Option<TelemetryMessage>> {
        self.socket
            .set_nonblocking(true)
            .map_err(|e| TeleopError::Transport(format!("set nonblocking: {e}")))?;
        let outcome = loop {
            match self.socket.recv(&mut self.buf) {
                Ok(len) => {
                    if let Some(m) = self.decode_current(len) {
                        if latest.replace(m).is_some() {
                            self.dropped += 1;
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(latest),
                Err(e) => break Err(TeleopError::Transport(format!("receive telemetry: {e}"))),
            }
        };
        self.socket
            .set_nonblocking(false)
            .map_err(|e| TeleopError::Transport(format!("set blocking: {e}")))?;
        Ok(outcome?)
    }
}

impl Subscribe for UdpSubscriber {
    fn recv_latest(&mut self, timeout: Option<Duration>) -> Result<Received> {
        // A zero read timeout is rejected by the OS; treat it as a poll.
        let timeout = timeout.map(|t| t.max(Duration::from_micros(1)));
        self.socket
            .set_read_timeout(timeout)
            .map_err(|e| TeleopError::Transport(format!("set read timeout: {e}")))?;
        let first = loop {
            match self.socket.recv(&mut self.buf) {
                Ok(len) => {
                    if let Some(m) = self.decode_current(len) {
                        break Some(m);
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    break None;
                }
                Err(e) => {
                    return Err(TeleopError::Transport(format!("receive telemetry: {e}")).into());
                }
            }
        };
        let Some(first) = first else {
            return Ok(Received::TimedOut);
        };
        Ok(match self.drain(Some(first))? {
            Some(m) => Received::Message(m),
            None => Received::TimedOut,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_ordered_array() {
        let m = TelemetryMessage::new([1.5, -2.0, 0.25], true, false);
        let json = String::from_utf8(m.encode().expect("encode")).expect("utf8");
        assert_eq!(json, "[1.5,-2.0,0.25,true,false,false]");
        assert_eq!(TelemetryMessage::decode(json.as_bytes()).expect("decode"), m);
    }

    #[test]
    fn rejects_short_arrays() {
        assert!(TelemetryMessage::decode(b"[1.0,2.0,3.0,true,false]").is_err());
        assert!(TelemetryMessage::decode(b"{\"x\":1.0}").is_err());
    }

    #[test]
    fn terminate_keeps_position() {
        let m = TelemetryMessage::terminate_at([3.0, 4.0, 5.0]);
        assert!(m.terminate && !m.movement_enabled && !m.gripper_request);
        assert_eq!(m.position(), [3.0, 4.0, 5.0]);
    }

    #[test]
    fn udp_subscriber_keeps_newest_datagram() {
        let mut sub = UdpSubscriber::bind("127.0.0.1:0").expect("bind");
        let addr = sub.local_addr().expect("addr");
        let mut publisher = UdpPublisher::connect(addr).expect("connect");
        for i in 0..5 {
            publisher
                .publish(&TelemetryMessage::new([f64::from(i), 0.0, 0.0], false, true))
                .expect("send");
        }
        // Let the loopback queue fill before reading.
        std::thread::sleep(Duration::from_millis(50));
        let got = sub
            .recv_latest(Some(Duration::from_millis(500)))
            .expect("recv");
        assert_eq!(
            got,
            Received::Message(TelemetryMessage::new([4.0, 0.0, 0.0], false, true))
        );
        assert_eq!(sub.dropped(), 4);
        assert_eq!(publisher.sent(), 5);
    }

    #[test]
    fn udp_subscriber_skips_garbage_and_times_out() {
        let mut sub = UdpSubscriber::bind("127.0.0.1:0").expect("bind");
        let addr = sub.local_addr().expect("addr");
        let raw = UdpSocket::bind("127.0.0.1:0").expect("raw socket");
        raw.send_to(b"not json", addr).expect("send");
        let got = sub
            .recv_latest(Some(Duration::from_millis(50)))
            .expect("recv");
        assert_eq!(got, Received::TimedOut);
        assert_eq!(sub.malformed(), 1);
    }
}
