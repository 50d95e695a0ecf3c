//! Syslog listener: UDP (one datagram = one record), TCP/TLS (octet-counted
//! or newline-delimited framing), with a per-connection IP/CIDR allowlist
//! and configurable TLS minimum version.

use std::net::IpAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use ipnet::IpNet;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;

use crate::error::SourceError;
use crate::model::{SourceKind, SourceSpec, SyslogTransport, TlsConfig, TlsMinVersion};

use super::{stopped, FrameSink};

const UDP_MAX_DATAGRAM: usize = 64 * 1024;
const TCP_MAX_FRAME: usize = 64 * 1024;

pub async fn spawn(
    spec: SourceSpec,
    sink: FrameSink,
    stop: Arc<std::sync::atomic::AtomicBool>,
) -> Result<JoinHandle<()>, SourceError> {
    let SourceKind::Syslog {
        transport,
        bind,
        tls,
        allowlist,
    } = spec.kind.clone()
    else {
        unreachable!("syslog::spawn called with non-syslog source kind")
    };

    let allowlist = compile_allowlist(&allowlist)
        .map_err(|e| SourceError::ConfigInvalid(format!("bad allowlist entry: {e}")))?;

    match transport {
        SyslogTransport::Udp => {
            let socket = UdpSocket::bind(&bind)
                .await
                .map_err(|e| SourceError::StartFailed {
                    reason: format!("udp bind {bind}: {e}"),
                })?;
            Ok(tokio::spawn(run_udp(socket, sink, stop)))
        }
        SyslogTransport::Tcp => {
            let listener =
                TcpListener::bind(&bind)
                    .await
                    .map_err(|e| SourceError::StartFailed {
                        reason: format!("tcp bind {bind}: {e}"),
                    })?;
            Ok(tokio::spawn(run_tcp(listener, sink, stop, allowlist, None)))
        }
        SyslogTransport::Tls => {
            let tls_cfg = tls.ok_or_else(|| {
                SourceError::ConfigInvalid("tls transport requires tls config".to_string())
            })?;
            let listener =
                TcpListener::bind(&bind)
                    .await
                    .map_err(|e| SourceError::StartFailed {
                        reason: format!("tcp(tls) bind {bind}: {e}"),
                    })?;
            let acceptor = build_tls_acceptor(&tls_cfg)
                .map_err(|e| SourceError::ConfigInvalid(format!("tls config: {e}")))?;
            Ok(tokio::spawn(run_tcp(
                listener,
                sink,
                stop,
                allowlist,
                Some((acceptor, tls_cfg)),
            )))
        }
    }
}

fn compile_allowlist(entries: &[String]) -> anyhow::Result<Vec<IpNet>> {
    entries
        .iter()
        .map(|e| {
            if e.contains('/') {
                e.parse::<IpNet>().map_err(anyhow::Error::from)
            } else {
                e.parse::<IpAddr>()
                    .map(IpNet::from)
                    .map_err(anyhow::Error::from)
            }
        })
        .collect()
}

fn allowed(allowlist: &[IpNet], addr: IpAddr) -> bool {
    allowlist.is_empty() || allowlist.iter().any(|net| net.contains(&addr))
}

async fn run_udp(socket: UdpSocket, sink: FrameSink, stop: Arc<std::sync::atomic::AtomicBool>) {
    let mut buf = vec![0u8; UDP_MAX_DATAGRAM];
    loop {
        if stopped(&stop) {
            return;
        }
        let recv = tokio::time::timeout(std::time::Duration::from_millis(500), socket.recv_from(&mut buf)).await;
        match recv {
            Ok(Ok((n, _addr))) => {
                // Datagrams are truncated to 64 KiB: the buffer is already
                // exactly that size, so `n` can never exceed it.
                let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                sink.accept(text);
            }
            Ok(Err(_)) => sink.record_framing_error(),
            Err(_) => {} // read timeout: loop back and re-check `stop`
        }
    }
}

async fn run_tcp(
    listener: TcpListener,
    sink: FrameSink,
    stop: Arc<std::sync::atomic::AtomicBool>,
    allowlist: Vec<IpNet>,
    tls: Option<(tokio_rustls::TlsAcceptor, TlsConfig)>,
) {
    loop {
        if stopped(&stop) {
            return;
        }
        let accept = tokio::time::timeout(std::time::Duration::from_millis(500), listener.accept()).await;
        let (stream, peer) = match accept {
            Ok(Ok(pair)) => pair,
            Ok(Err(_)) => continue,
            Err(_) => continue,
        };

        if !allowed(&allowlist, peer.ip()) {
            tracing::debug!(peer = %peer, "syslog tcp connection rejected: not in allowlist");
            continue;
        }

        let sink = sink.clone();
        let stop = Arc::clone(&stop);
        match &tls {
            None => {
                tokio::spawn(async move {
                    frame_connection(stream, sink, stop).await;
                });
            }
            Some((acceptor, cfg)) => {
                let acceptor = acceptor.clone();
                let require_client_cert = cfg.require_client_cert;
                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            if require_client_cert {
                                let (_, session) = tls_stream.get_ref();
                                if session.peer_certificates().is_none() {
                                    tracing::warn!(peer = %peer, "tls client cert required but absent");
                                    return;
                                }
                            }
                            frame_connection(tls_stream, sink, stop).await;
                        }
                        Err(e) => {
                            tracing::debug!(peer = %peer, error = %e, "tls handshake failed");
                        }
                    }
                });
            }
        }
    }
}

/// Reads one connection to completion, applying the octet-counted-or-
/// newline-delimited framing rule: if the first non-space byte of a frame
/// is a decimal digit followed by a space, the digits are a byte count;
/// otherwise fall back to LF/CRLF-delimited framing.
async fn frame_connection<S: AsyncRead + Unpin>(
    mut stream: S,
    sink: FrameSink,
    stop: Arc<std::sync::atomic::AtomicBool>,
) {
    let mut pending = Vec::new();
    let mut read_buf = vec![0u8; 8192];

    loop {
        if stopped(&stop) {
            return;
        }

        if let Some((frame, consumed)) = try_extract_frame(&pending) {
            match frame {
                Ok(text) => sink.accept(text),
                Err(_) => sink.record_framing_error(),
            }
            pending.drain(..consumed);
            continue;
        }

        match stream.read(&mut read_buf).await {
            Ok(0) => {
                if !pending.is_empty() {
                    let text = String::from_utf8_lossy(&pending).into_owned();
                    if !text.trim().is_empty() {
                        sink.accept(text);
                    }
                }
                return;
            }
            Ok(n) => pending.extend_from_slice(&read_buf[..n]),
            Err(_) => {
                sink.record_framing_error();
                return;
            }
        }
    }
}

/// Attempts to pull one complete frame out of `pending`. Returns
/// `Some((frame_result, bytes_consumed))` when a full frame is available,
/// `None` if more bytes are needed.
fn try_extract_frame(pending: &[u8]) -> Option<(Result<String, ()>, usize)> {
    let first_non_space = pending.iter().position(|b| *b != b' ')?;
    let first = *pending.get(first_non_space)?;

    if first.is_ascii_digit() {
        // Octet-counted: <digits><space><payload of that many bytes>.
        let mut i = first_non_space;
        while i < pending.len() && pending[i].is_ascii_digit() {
            i += 1;
        }
        if i >= pending.len() || pending[i] != b' ' {
            // Digits not yet followed by a space: need more bytes, unless
            // this is clearly not a count (too many digits already).
            if i - first_non_space > 7 {
                return Some((Err(()), pending.len()));
            }
            return None;
        }
        let count: usize = std::str::from_utf8(&pending[first_non_space..i])
            .ok()?
            .parse()
            .ok()?;
        let payload_start = i + 1;
        if count > TCP_MAX_FRAME {
            return Some((Err(()), pending.len()));
        }
        if pending.len() < payload_start + count {
            return None;
        }
        let frame = String::from_utf8_lossy(&pending[payload_start..payload_start + count]).into_owned();
        return Some((Ok(frame), payload_start + count));
    }

    // Newline-delimited (LF or CRLF).
    let newline_pos = pending.iter().position(|b| *b == b'\n')?;
    let line = &pending[..newline_pos];
    let line = if line.last() == Some(&b'\r') {
        &line[..line.len() - 1]
    } else {
        line
    };
    Some((
        Ok(String::from_utf8_lossy(line).into_owned()),
        newline_pos + 1,
    ))
}

fn build_tls_acceptor(cfg: &TlsConfig) -> anyhow::Result<tokio_rustls::TlsAcceptor> {
    use std::fs::File;
    use std::io::BufReader;

    let cert_file = File::open(&cfg.cert_path)?;
    let key_file = File::open(&cfg.key_path)?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(cert_file)).collect::<Result<_, _>>()?;
    let mut keys: Vec<_> =
        rustls_pemfile::pkcs8_private_keys(&mut BufReader::new(key_file)).collect::<Result<_, _>>()?;
    let key = keys
        .pop()
        .ok_or_else(|| anyhow::anyhow!("no private key found in {}", cfg.key_path))?;

    let protocol_versions: &[&'static rustls::SupportedProtocolVersion] = match cfg.min_version {
        TlsMinVersion::Tls12 => &[&rustls::version::TLS12, &rustls::version::TLS13],
        TlsMinVersion::Tls13 => &[&rustls::version::TLS13],
    };

    let mut server_config = rustls::ServerConfig::builder_with_protocol_versions(protocol_versions)
        .with_no_client_auth()
        .with_single_cert(
            certs.into_iter().map(rustls::pki_types::CertificateDer::from).collect(),
            rustls::pki_types::PrivateKeyDer::Pkcs8(rustls::pki_types::PrivatePkcs8KeyDer::from(key.secret_pkcs8_der().to_vec())),
        )?;
    server_config.alpn_protocols = vec![];

    Ok(tokio_rustls::TlsAcceptor::from(Arc::new(server_config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octet_counted_frame_extracts_exact_payload() {
        let input = b"5 hello6 world!".to_vec();
        let (frame, consumed) = try_extract_frame(&input).unwrap();
        assert_eq!(frame.unwrap(), "hello");
        assert_eq!(consumed, 7);
    }

    #[test]
    fn newline_delimited_frame_strips_crlf() {
        let input = b"hello world\r\nnext".to_vec();
        let (frame, consumed) = try_extract_frame(&input).unwrap();
        assert_eq!(frame.unwrap(), "hello world");
        assert_eq!(consumed, 13);
    }

    #[test]
    fn incomplete_octet_frame_needs_more_bytes() {
        let input = b"10 short".to_vec();
        assert!(try_extract_frame(&input).is_none());
    }

    #[test]
    fn allowlist_permits_matching_cidr() {
        let nets = compile_allowlist(&["10.0.0.0/8".to_string()]).unwrap();
        assert!(allowed(&nets, "10.1.2.3".parse().unwrap()));
        assert!(!allowed(&nets, "192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn empty_allowlist_permits_everyone() {
        assert!(allowed(&[], "1.2.3.4".parse().unwrap()));
    }
}
