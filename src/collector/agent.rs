//! Client side of the coverage agent protocol.
//!
//! The wire format is owned by the agent collaborator; this client only
//! knows the two commands and that a dump response is a length-prefixed
//! capture payload in the standard codec.

use log::debug;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use super::nodes::NodeInstance;
use crate::capture::exec::{decode_capture, ExecutionData};
use crate::errors::{CollectorError, Result};

const CMD_DUMP: u8 = 0x01;
const CMD_RESET: u8 = 0x02;
const ACK: u8 = 0x00;

const AGENT_TIMEOUT: Duration = Duration::from_secs(30);

pub trait AgentClient {
    /// Ask the agent for its current probe data without resetting it.
    fn request_dump(&self) -> Result<ExecutionData>;

    /// Ask the agent to zero its in-memory probe data.
    fn request_reset(&self) -> Result<()>;
}

/// Hands out a client per node; the seam the collector fans out through.
pub trait AgentClientFactory: Sync {
    fn client(&self, node: &NodeInstance) -> Box<dyn AgentClient>;
}

pub struct TcpAgentClient {
    host: String,
    port: u16,
}

impl TcpAgentClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn connect(&self) -> Result<TcpStream> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))?;
        stream.set_read_timeout(Some(AGENT_TIMEOUT))?;
        stream.set_write_timeout(Some(AGENT_TIMEOUT))?;
        Ok(stream)
    }
}

impl AgentClient for TcpAgentClient {
    fn request_dump(&self) -> Result<ExecutionData> {
        debug!("requesting dump from {}:{}", self.host, self.port);
        let mut stream = self.connect()?;
        stream.write_all(&[CMD_DUMP])?;

        let mut len_bytes = [0u8; 4];
        stream.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload)?;
        decode_capture(&payload)
    }

    fn request_reset(&self) -> Result<()> {
        debug!("requesting reset on {}:{}", self.host, self.port);
        let mut stream = self.connect()?;
        stream.write_all(&[CMD_RESET])?;

        let mut ack = [0u8; 1];
        stream.read_exact(&mut ack)?;
        if ack[0] != ACK {
            return Err(CollectorError::external_tool(
                format!("coverage agent {}:{}", self.host, self.port),
                format!("unexpected reset response {:#04x}", ack[0]),
            ));
        }
        Ok(())
    }
}

pub struct TcpClientFactory;

impl AgentClientFactory for TcpClientFactory {
    fn client(&self, node: &NodeInstance) -> Box<dyn AgentClient> {
        Box::new(TcpAgentClient::new(node.host.clone(), node.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::exec::{encode_capture, ClassRecord};
    use std::net::TcpListener;
    use std::thread;

    fn serve_dump_once(data: ExecutionData) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut cmd = [0u8; 1];
            stream.read_exact(&mut cmd).unwrap();
            assert_eq!(cmd[0], CMD_DUMP);
            let payload = encode_capture(&data).unwrap();
            stream
                .write_all(&(payload.len() as u32).to_le_bytes())
                .unwrap();
            stream.write_all(&payload).unwrap();
        });
        port
    }

    #[test]
    fn test_dump_round_trip_over_tcp() {
        let mut data = ExecutionData::new();
        data.add_class(ClassRecord {
            class_id: 3,
            name: "com/x/Agent".into(),
            probes: vec![true, false],
        })
        .unwrap();

        let port = serve_dump_once(data.clone());
        let client = TcpAgentClient::new("127.0.0.1", port);
        let received = client.request_dump().unwrap();
        assert_eq!(received, data);
    }

    #[test]
    fn test_unreachable_agent_is_io_error() {
        // Port 1 is essentially never listening.
        let client = TcpAgentClient::new("127.0.0.1", 1);
        assert!(matches!(
            client.request_dump(),
            Err(CollectorError::Io(_))
        ));
    }

    #[test]
    fn test_reset_rejects_bad_ack() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut cmd = [0u8; 1];
            stream.read_exact(&mut cmd).unwrap();
            stream.write_all(&[0xff]).unwrap();
        });

        let client = TcpAgentClient::new("127.0.0.1", port);
        assert!(matches!(
            client.request_reset(),
            Err(CollectorError::ExternalTool { .. })
        ));
    }
}
