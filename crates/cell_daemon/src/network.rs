//! Network worker: owns the receive side of the transport on its own thread
//! and turns what arrives into commands for the tick loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cell_core::{Color, Command, CommandEnvelope, CommandId, Origin};
use crossbeam_channel::{unbounded, Receiver};

use crate::transport::{Transport, TransportError};

pub struct NetworkLink {
    transport: Arc<dyn Transport>,
    inbound: Receiver<Command>,
    closing: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    local: Color,
}

impl NetworkLink {
    pub fn spawn(transport: Arc<dyn Transport>, local: Color) -> Self {
        let (sender, inbound) = unbounded();
        let closing = Arc::new(AtomicBool::new(false));
        let worker = {
            let transport = transport.clone();
            let closing = closing.clone();
            std::thread::spawn(move || loop {
                match transport.receive() {
                    Ok(payload) => {
                        if sender.send(Command::RemoteMove { payload }).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        if !closing.load(Ordering::Acquire) {
                            tracing::warn!("peer link lost: {err}");
                            let _ = sender.send(Command::TransportLost);
                        }
                        break;
                    }
                }
            })
        };
        tracing::info!(%local, "network worker started");
        Self {
            transport,
            inbound,
            closing,
            worker: Some(worker),
            local,
        }
    }

    pub fn send_move(&self, payload: &str) -> Result<(), TransportError> {
        self.transport.send(payload.as_bytes())
    }

    /// Everything received since the last call, wrapped as commands from
    /// the remote side.
    pub fn drain(&self, issued_tick: u64, next_command_id: &mut u64) -> Vec<CommandEnvelope> {
        self.inbound
            .try_iter()
            .map(|command| {
                let id = CommandId(format!("cmd_{:06}", *next_command_id));
                *next_command_id += 1;
                CommandEnvelope {
                    id,
                    issued_by: self.local.opponent(),
                    origin: Origin::Network,
                    issued_tick,
                    command,
                }
            })
            .collect()
    }

    /// Stops the worker. Errors from the closing socket are not reported.
    pub fn shutdown(&mut self) {
        self.closing.store(true, Ordering::Release);
        self.transport.shutdown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for NetworkLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TcpTransport;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    fn loopback_pair() -> (Arc<TcpTransport>, Arc<TcpTransport>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let joiner = std::thread::spawn(move || TcpTransport::join(addr).unwrap());
        let host = TcpTransport::accept(&listener).unwrap();
        (Arc::new(host), Arc::new(joiner.join().unwrap()))
    }

    fn drain_until(link: &NetworkLink, count: usize) -> Vec<CommandEnvelope> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut next_id = 0;
        let mut got = Vec::new();
        while got.len() < count && Instant::now() < deadline {
            got.extend(link.drain(0, &mut next_id));
            std::thread::sleep(Duration::from_millis(5));
        }
        got
    }

    #[test]
    fn received_lines_become_remote_moves() {
        let (host, guest) = loopback_pair();
        let link = NetworkLink::spawn(guest, Color::Red);
        host.send(br#"{"action":"pass"}"#).unwrap();

        let got = drain_until(&link, 1);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].issued_by, Color::Green);
        assert_eq!(got[0].origin, Origin::Network);
        assert!(matches!(
            &got[0].command,
            Command::RemoteMove { payload } if payload == br#"{"action":"pass"}"#
        ));
    }

    #[test]
    fn peer_disconnect_reports_transport_lost() {
        let (host, guest) = loopback_pair();
        let link = NetworkLink::spawn(guest, Color::Red);
        host.shutdown();

        let got = drain_until(&link, 1);
        assert!(matches!(got[0].command, Command::TransportLost));
    }

    #[test]
    fn own_shutdown_is_silent() {
        let (_host, guest) = loopback_pair();
        let mut link = NetworkLink::spawn(guest, Color::Green);
        link.shutdown();
        let mut next_id = 0;
        assert!(link.drain(0, &mut next_id).is_empty());
    }
}
