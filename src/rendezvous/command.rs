use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::error::{Error, Result};

const REGISTER_SERVER: &str = "REGISTER_SERVER";
const REQUEST_SERVER_LIST: &str = "REQUEST_SERVER_LIST";
const SERVER_LIST: &str = "SERVER_LIST";
const REQUEST_CONNECTION: &str = "REQUEST_CONNECTION";
const CONNECTION_REQUEST_ACCEPTED: &str = "CONNECTION_REQUEST_ACCEPTED";
const CONNECTION_REQUEST_REJECTED: &str = "CONNECTION_REQUEST_REJECTED";
const HOLE_PUNCH: &str = "HOLE_PUNCH";
const HOLE_PUNCHING: &str = "HOLE_PUNCHING";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TargetUnknown,
}

impl RejectReason {
    fn as_str(&self) -> &'static str {
        match self {
            RejectReason::TargetUnknown => "target-unknown",
        }
    }
}

/// Text line exchanged between peers and the rendezvous server.
///
/// Fields are `|` separated, endpoints are written `ip,port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `REGISTER_SERVER|ip,port`
    Register(SocketAddr),
    /// `REQUEST_SERVER_LIST`
    ListRequest,
    /// `SERVER_LIST|ip,port|...`
    List(Vec<SocketAddr>),
    /// `REQUEST_CONNECTION|initiator|target`
    ConnectRequest {
        initiator: SocketAddr,
        target: SocketAddr,
    },
    /// `CONNECTION_REQUEST_ACCEPTED`
    Accepted,
    /// `CONNECTION_REQUEST_REJECTED|reason`
    Rejected(RejectReason),
    /// `HOLE_PUNCH|ip,port`, server tells a peer whom to punch.
    HolePunch(SocketAddr),
    /// `HOLE_PUNCHING|ip,port`, the datagram a peer sends to open its mapping.
    Punch(SocketAddr),
}

impl Command {
    pub fn parse(datagram: &[u8]) -> Result<Self> {
        let line = std::str::from_utf8(datagram).map_err(|_| Error::violation("not utf-8"))?;
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields: Vec<&str> = line.split('|').collect();
        if fields.len() > 1 && fields.last() == Some(&"") {
            fields.pop();
        }

        let cmd = match (fields[0], &fields[1..]) {
            (REGISTER_SERVER, [ep]) => Command::Register(parse_endpoint(ep)?),
            (REQUEST_SERVER_LIST, []) => Command::ListRequest,
            (SERVER_LIST, eps) => Command::List(
                eps.iter()
                    .map(|ep| parse_endpoint(ep))
                    .collect::<Result<_>>()?,
            ),
            (REQUEST_CONNECTION, [initiator, target]) => Command::ConnectRequest {
                initiator: parse_endpoint(initiator)?,
                target: parse_endpoint(target)?,
            },
            (CONNECTION_REQUEST_ACCEPTED, []) => Command::Accepted,
            (CONNECTION_REQUEST_REJECTED, [reason]) if *reason == "target-unknown" => {
                Command::Rejected(RejectReason::TargetUnknown)
            }
            (HOLE_PUNCH, [ep]) => Command::HolePunch(parse_endpoint(ep)?),
            (HOLE_PUNCHING, [ep]) => Command::Punch(parse_endpoint(ep)?),
            (token, _) => return Err(Error::violation(format!("bad command {:?}", token))),
        };

        Ok(cmd)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Register(ep) => write!(f, "{}|{}", REGISTER_SERVER, Endpoint(ep)),
            Command::ListRequest => f.write_str(REQUEST_SERVER_LIST),
            Command::List(eps) => {
                f.write_str(SERVER_LIST)?;
                for ep in eps {
                    write!(f, "|{}", Endpoint(ep))?;
                }
                Ok(())
            }
            Command::ConnectRequest { initiator, target } => write!(
                f,
                "{}|{}|{}",
                REQUEST_CONNECTION,
                Endpoint(initiator),
                Endpoint(target)
            ),
            Command::Accepted => f.write_str(CONNECTION_REQUEST_ACCEPTED),
            Command::Rejected(reason) => {
                write!(f, "{}|{}", CONNECTION_REQUEST_REJECTED, reason.as_str())
            }
            Command::HolePunch(ep) => write!(f, "{}|{}", HOLE_PUNCH, Endpoint(ep)),
            Command::Punch(ep) => write!(f, "{}|{}", HOLE_PUNCHING, Endpoint(ep)),
        }
    }
}

struct Endpoint<'a>(&'a SocketAddr);

impl fmt::Display for Endpoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.0.ip(), self.0.port())
    }
}

fn parse_endpoint(s: &str) -> Result<SocketAddr> {
    let (ip, port) = s
        .split_once(',')
        .ok_or_else(|| Error::violation(format!("bad endpoint {:?}", s)))?;
    let ip: IpAddr = ip
        .parse()
        .map_err(|_| Error::violation(format!("bad ip {:?}", ip)))?;
    let port: u16 = port
        .parse()
        .map_err(|_| Error::violation(format!("bad port {:?}", port)))?;
    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn render() {
        assert_eq!(
            Command::Register(ep("10.0.0.5:4000")).to_string(),
            "REGISTER_SERVER|10.0.0.5,4000"
        );
        assert_eq!(
            Command::List(vec![ep("10.0.0.5:4000"), ep("[::1]:9")]).to_string(),
            "SERVER_LIST|10.0.0.5,4000|::1,9"
        );
        assert_eq!(Command::List(vec![]).to_string(), "SERVER_LIST");
        assert_eq!(
            Command::ConnectRequest {
                initiator: ep("1.2.3.4:5"),
                target: ep("10.0.0.5:4000")
            }
            .to_string(),
            "REQUEST_CONNECTION|1.2.3.4,5|10.0.0.5,4000"
        );
        assert_eq!(
            Command::Rejected(RejectReason::TargetUnknown).to_string(),
            "CONNECTION_REQUEST_REJECTED|target-unknown"
        );
        assert_eq!(
            Command::HolePunch(ep("1.2.3.4:5")).to_string(),
            "HOLE_PUNCH|1.2.3.4,5"
        );
    }

    #[test]
    fn parse() {
        assert_eq!(
            Command::parse(b"REGISTER_SERVER|10.0.0.5,4000\n").unwrap(),
            Command::Register(ep("10.0.0.5:4000"))
        );
        assert_eq!(
            Command::parse(b"REQUEST_SERVER_LIST").unwrap(),
            Command::ListRequest
        );
        assert_eq!(
            Command::parse(b"SERVER_LIST|10.0.0.5,4000|").unwrap(),
            Command::List(vec![ep("10.0.0.5:4000")])
        );
        assert_eq!(Command::parse(b"SERVER_LIST").unwrap(), Command::List(vec![]));
        assert_eq!(
            Command::parse(b"REQUEST_CONNECTION|1.2.3.4,5|::1,9\r\n").unwrap(),
            Command::ConnectRequest {
                initiator: ep("1.2.3.4:5"),
                target: ep("[::1]:9")
            }
        );
        assert_eq!(
            Command::parse(b"CONNECTION_REQUEST_ACCEPTED").unwrap(),
            Command::Accepted
        );
        assert_eq!(
            Command::parse(b"HOLE_PUNCHING|1.2.3.4,5").unwrap(),
            Command::Punch(ep("1.2.3.4:5"))
        );
    }

    #[test]
    fn violations() {
        for bad in [
            &b""[..],
            b"HELLO",
            b"REGISTER_SERVER",
            b"REGISTER_SERVER|10.0.0.5",
            b"REGISTER_SERVER|10.0.0.5,70000",
            b"REGISTER_SERVER|10.0.0,4000",
            b"REGISTER_SERVER|10.0.0.5,4000|extra",
            b"REQUEST_SERVER_LIST|junk",
            b"REQUEST_CONNECTION|1.2.3.4,5",
            b"CONNECTION_REQUEST_REJECTED|because",
            b"\xff\xfe",
        ] {
            assert!(
                matches!(Command::parse(bad), Err(Error::ProtocolViolation(_))),
                "{:?}",
                bad
            );
        }
    }
}
