//! The CCcam authentication handshake, wire-exact: 16-byte hello read →
//! 20-byte challenge write → 20-byte username write → 6-byte tag write →
//! 20-byte ack read. No length prefixes; every field is a raw buffer of
//! protocol-constant size.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use sha1::{Digest, Sha1};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;

use crate::cline::Credential;
use crate::crypto::{scramble_hello, StreamCipher, PROTOCOL_TAG};

pub const HELLO_LEN: usize = 16;
/// SHA-1 digest size; also the size of the username and ack buffers.
pub const CHALLENGE_LEN: usize = 20;
pub const USERNAME_LEN: usize = 20;
pub const TAG_LEN: usize = 6;
pub const ACK_LEN: usize = 20;

pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Terminal failure of one authentication attempt. The validator maps each
/// variant onto its outcome status.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("server connection: {0}")]
    Connection(#[from] io::Error),
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("no address found for host")]
    NoAddress,
    #[error("server empty response")]
    EmptyHello,
    #[error("bad username/password")]
    CredentialsRejected,
    #[error("wrong acknowledgement {0:?}")]
    WrongAck(String),
}

/// Runs one full authentication attempt against the credential's server.
/// Ok(()) means the server answered the credential submission with the
/// protocol tag. The socket is torn down on every exit path.
pub async fn authenticate(
    credential: &Credential,
    io_timeout: Duration,
) -> Result<(), HandshakeError> {
    let stream = connect(&credential.host, credential.port, io_timeout).await?;
    let mut session = Session::establish(stream, io_timeout).await?;
    session
        .login(&credential.username, &credential.password)
        .await
}

async fn connect(
    host: &str,
    port: u16,
    io_timeout: Duration,
) -> Result<TcpStream, HandshakeError> {
    let addrs: Vec<SocketAddr> = timeout(io_timeout, lookup_host((host, port)))
        .await
        .map_err(|_| HandshakeError::Timeout("resolve"))??
        .collect();
    if addrs.is_empty() {
        return Err(HandshakeError::NoAddress);
    }

    let mut last_err = None;
    for addr in addrs {
        match timeout(io_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(e)) => last_err = Some(HandshakeError::Connection(e)),
            Err(_) => last_err = Some(HandshakeError::Timeout("connect")),
        }
    }
    Err(last_err.unwrap_or(HandshakeError::NoAddress))
}

/// One live authentication session: the socket plus the two direction
/// ciphers, which only exist together. Both ends advance their cipher pair
/// in lockstep, so every transform call below is part of the wire contract.
struct Session {
    stream: TcpStream,
    send: StreamCipher,
    recv: StreamCipher,
    io_timeout: Duration,
}

impl Session {
    /// Reads the hello and derives the session keys: scrambled hello →
    /// SHA-1 digest keys the receive cipher (20 bytes), the decrypted hello
    /// keys the send cipher (16 bytes), and the digest pushed through the
    /// send cipher's decrypt becomes the challenge response.
    async fn establish(
        mut stream: TcpStream,
        io_timeout: Duration,
    ) -> Result<Session, HandshakeError> {
        let mut hello = [0u8; HELLO_LEN];
        read_exact_or(
            &mut stream,
            &mut hello,
            io_timeout,
            "hello read",
            HandshakeError::EmptyHello,
        )
        .await?;

        scramble_hello(&mut hello);
        let mut hasher = Sha1::new();
        hasher.update(hello);
        let mut challenge: [u8; CHALLENGE_LEN] = hasher.finalize().into();

        let mut recv = StreamCipher::new(&challenge);
        recv.decrypt(&mut hello);
        let mut send = StreamCipher::new(&hello);
        send.decrypt(&mut challenge);

        let mut session = Session {
            stream,
            send,
            recv,
            io_timeout,
        };
        session.send_encrypted(&mut challenge).await?;
        Ok(session)
    }

    /// Submits the credentials and checks the ack. An ack read that hits EOF
    /// means the server dropped us after seeing the credentials — bad
    /// username/password. An ack that decrypts to anything but the tag means
    /// the cipher states diverged or the server misbehaved.
    async fn login(&mut self, username: &str, password: &str) -> Result<(), HandshakeError> {
        let mut user_buf = padded(username.as_bytes(), USERNAME_LEN);
        self.send_encrypted(&mut user_buf).await?;

        // The password ciphertext never goes on the wire. Encrypting it
        // advances the send cipher to the state the server reaches with its
        // stored copy; the tag message that follows carries the proof.
        let mut password_buf = password.as_bytes().to_vec();
        self.send.encrypt(&mut password_buf);

        let mut tag_buf = padded(PROTOCOL_TAG, TAG_LEN);
        self.send_encrypted(&mut tag_buf).await?;

        let mut ack = [0u8; ACK_LEN];
        read_exact_or(
            &mut self.stream,
            &mut ack,
            self.io_timeout,
            "ack read",
            HandshakeError::CredentialsRejected,
        )
        .await?;
        self.recv.decrypt(&mut ack);

        let text = strip_trailing_nuls(&ack);
        if text == PROTOCOL_TAG {
            Ok(())
        } else {
            Err(HandshakeError::WrongAck(
                String::from_utf8_lossy(text).into_owned(),
            ))
        }
    }

    async fn send_encrypted(&mut self, buf: &mut [u8]) -> Result<(), HandshakeError> {
        self.send.encrypt(buf);
        match timeout(self.io_timeout, self.stream.write_all(buf)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(HandshakeError::Timeout("write")),
        }
    }
}

async fn read_exact_or(
    stream: &mut TcpStream,
    buf: &mut [u8],
    io_timeout: Duration,
    op: &'static str,
    on_eof: HandshakeError,
) -> Result<(), HandshakeError> {
    match timeout(io_timeout, stream.read_exact(buf)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Err(on_eof),
        Ok(Err(e)) => Err(HandshakeError::Connection(e)),
        Err(_) => Err(HandshakeError::Timeout(op)),
    }
}

fn padded(value: &[u8], len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    let n = value.len().min(len);
    buf[..n].copy_from_slice(&value[..n]);
    buf
}

pub(crate) fn strip_trailing_nuls(buf: &[u8]) -> &[u8] {
    let end = buf.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    &buf[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{spawn_server, ServerScript};

    fn credential(addr: SocketAddr, username: &str, password: &str) -> Credential {
        Credential {
            host: addr.ip().to_string(),
            port: addr.port(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    const TEST_TIMEOUT: Duration = Duration::from_millis(2_000);

    #[tokio::test]
    async fn authenticates_against_protocol_mock() {
        let addr = spawn_server(ServerScript::Authenticate {
            username: "johndoe".to_string(),
            password: "hunter2".to_string(),
        })
        .await;
        let cred = credential(addr, "johndoe", "hunter2");
        authenticate(&cred, TEST_TIMEOUT).await.expect("handshake should succeed");
    }

    #[tokio::test]
    async fn wrong_password_reads_empty_ack() {
        let addr = spawn_server(ServerScript::Authenticate {
            username: "johndoe".to_string(),
            password: "hunter2".to_string(),
        })
        .await;
        let cred = credential(addr, "johndoe", "letmein");
        let err = authenticate(&cred, TEST_TIMEOUT).await.expect_err("must fail");
        assert!(matches!(err, HandshakeError::CredentialsRejected));
    }

    #[tokio::test]
    async fn unknown_username_reads_empty_ack() {
        let addr = spawn_server(ServerScript::Authenticate {
            username: "johndoe".to_string(),
            password: "hunter2".to_string(),
        })
        .await;
        let cred = credential(addr, "someoneelse", "hunter2");
        let err = authenticate(&cred, TEST_TIMEOUT).await.expect_err("must fail");
        assert!(matches!(err, HandshakeError::CredentialsRejected));
    }

    #[tokio::test]
    async fn garbage_ack_is_a_protocol_reject() {
        let addr = spawn_server(ServerScript::WrongAck {
            username: "johndoe".to_string(),
            password: "hunter2".to_string(),
        })
        .await;
        let cred = credential(addr, "johndoe", "hunter2");
        let err = authenticate(&cred, TEST_TIMEOUT).await.expect_err("must fail");
        assert!(matches!(err, HandshakeError::WrongAck(_)));
    }

    #[tokio::test]
    async fn immediate_close_is_an_empty_response() {
        let addr = spawn_server(ServerScript::ImmediateClose).await;
        let cred = credential(addr, "johndoe", "hunter2");
        let err = authenticate(&cred, TEST_TIMEOUT).await.expect_err("must fail");
        assert!(matches!(err, HandshakeError::EmptyHello));
    }

    #[tokio::test]
    async fn close_after_hello_fails_before_the_ack() {
        let addr = spawn_server(ServerScript::HelloThenClose).await;
        let cred = credential(addr, "johndoe", "hunter2");
        let err = authenticate(&cred, TEST_TIMEOUT).await.expect_err("must fail");
        // Depending on how fast the peer FIN lands, either a write fails or
        // the ack read sees EOF.
        assert!(matches!(
            err,
            HandshakeError::Connection(_) | HandshakeError::CredentialsRejected
        ));
    }

    #[tokio::test]
    async fn silent_server_times_out_on_the_hello() {
        let addr = spawn_server(ServerScript::Silent).await;
        let cred = credential(addr, "johndoe", "hunter2");
        let err = authenticate(&cred, Duration::from_millis(300))
            .await
            .expect_err("must fail");
        assert!(matches!(err, HandshakeError::Timeout("hello read")));
    }

    #[test]
    fn padded_truncates_and_zero_fills() {
        assert_eq!(padded(b"user", 6), b"user\0\0");
        assert_eq!(padded(b"overlong-name", 6), b"overlo");
        assert_eq!(padded(b"", 3), b"\0\0\0");
    }

    #[test]
    fn trailing_nul_strip_only_touches_the_tail() {
        assert_eq!(strip_trailing_nuls(b"CCcam\0\0\0"), b"CCcam");
        assert_eq!(strip_trailing_nuls(b"\0mid\0dle\0\0"), b"\0mid\0dle");
        assert_eq!(strip_trailing_nuls(b"\0\0\0"), b"");
        assert_eq!(strip_trailing_nuls(b""), b"");
    }
}
