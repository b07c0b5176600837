//! In-process CCcam servers for tests. The authenticate script mirrors the
//! client's key derivation exactly, so a full round-trip exercises both
//! directions of the cipher pair.

use std::net::SocketAddr;
use std::time::Duration;

use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;

use crate::crypto::{scramble_hello, StreamCipher, PROTOCOL_TAG};
use crate::handshake::{strip_trailing_nuls, ACK_LEN, CHALLENGE_LEN, TAG_LEN, USERNAME_LEN};

const MOCK_HELLO: [u8; 16] = [
    0xDE, 0xAD, 0xBE, 0xEF, 0x10, 0x21, 0x32, 0x43, 0x54, 0x65, 0x76, 0x87, 0x98, 0xA9, 0xBA,
    0xCB,
];

/// Per-connection behavior of a mock server.
#[derive(Clone)]
pub(crate) enum ServerScript {
    /// Accept and close without a hello.
    ImmediateClose,
    /// Send the hello, then close.
    HelloThenClose,
    /// Accept and never send or read anything.
    Silent,
    /// Speak the whole protocol; credentials other than the stored pair
    /// make the cipher states diverge or the user check fail, and the
    /// connection is dropped without an ack.
    Authenticate { username: String, password: String },
    /// Speak the whole protocol but answer with a non-tag ack.
    WrongAck { username: String, password: String },
}

/// Binds a loopback listener and serves `script` on every connection.
pub(crate) async fn spawn_server(script: ServerScript) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock listener");
    let addr = listener.local_addr().expect("mock listener addr");
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let script = script.clone();
                    tokio::spawn(handle(stream, script));
                }
                Err(_) => break,
            }
        }
    });
    addr
}

async fn handle(mut stream: TcpStream, script: ServerScript) {
    match script {
        ServerScript::ImmediateClose => {}
        ServerScript::HelloThenClose => {
            let _ = stream.write_all(&MOCK_HELLO).await;
        }
        ServerScript::Silent => {
            let _stream = stream;
            sleep(Duration::from_secs(3600)).await;
        }
        ServerScript::Authenticate { username, password } => {
            let _ = serve_protocol(&mut stream, &username, &password, false).await;
        }
        ServerScript::WrongAck { username, password } => {
            let _ = serve_protocol(&mut stream, &username, &password, true).await;
        }
    }
}

/// Server side of the handshake. A client that fails any check is dropped
/// without an ack, but only after its full transmission has been drained: a
/// close with unread bytes still queued turns into a reset on the wire
/// instead of a clean end-of-stream.
async fn serve_protocol(
    stream: &mut TcpStream,
    username: &str,
    password: &str,
    wrong_ack: bool,
) -> std::io::Result<()> {
    stream.write_all(&MOCK_HELLO).await?;

    // Mirror of the client derivation: the digest of the scrambled hello
    // keys our send direction, the decrypted hello keys our receive
    // direction, and decrypting our own digest copy predicts the challenge.
    let mut scrambled = MOCK_HELLO;
    scramble_hello(&mut scrambled);
    let mut hasher = Sha1::new();
    hasher.update(scrambled);
    let digest: [u8; CHALLENGE_LEN] = hasher.finalize().into();

    let mut srv_send = StreamCipher::new(&digest);
    let mut plain_hello = scrambled;
    srv_send.decrypt(&mut plain_hello);
    let mut srv_recv = StreamCipher::new(&plain_hello);
    let mut expected_challenge = digest;
    srv_recv.decrypt(&mut expected_challenge);

    let mut ok = true;

    let mut challenge = [0u8; CHALLENGE_LEN];
    stream.read_exact(&mut challenge).await?;
    srv_recv.decrypt(&mut challenge);
    ok &= challenge == expected_challenge;

    let mut user_buf = [0u8; USERNAME_LEN];
    stream.read_exact(&mut user_buf).await?;
    srv_recv.decrypt(&mut user_buf);
    ok &= strip_trailing_nuls(&user_buf) == username.as_bytes();

    // The client encrypted its password without sending it; advancing our
    // receive cipher over the stored password keeps the states in lockstep
    // only when the passwords match.
    let mut stored_password = password.as_bytes().to_vec();
    srv_recv.encrypt(&mut stored_password);

    let mut tag_buf = [0u8; TAG_LEN];
    stream.read_exact(&mut tag_buf).await?;
    srv_recv.decrypt(&mut tag_buf);
    ok &= tag_buf == *b"CCcam\0";

    if !ok {
        return Ok(());
    }

    let mut ack = [0u8; ACK_LEN];
    if wrong_ack {
        ack[..13].copy_from_slice(b"access denied");
    } else {
        ack[..PROTOCOL_TAG.len()].copy_from_slice(PROTOCOL_TAG);
    }
    srv_send.encrypt(&mut ack);
    stream.write_all(&ack).await?;
    Ok(())
}
