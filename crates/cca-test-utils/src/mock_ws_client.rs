use cca_protocol::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::protocol::Message;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A text-frame WebSocket client for driving `GET /ws` in tests. Session
/// auth is carried by the `session` cookie, not a bearer header, matching
/// how a real browser authenticates the upgrade request.
pub struct CcaWsClient {
    write: futures_util::stream::SplitSink<WsStream, Message>,
    read: futures_util::stream::SplitStream<WsStream>,
}

impl CcaWsClient {
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    pub async fn connect_with_session_cookie(
        url: &str,
        session_token: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        use tokio_tungstenite::tungstenite::handshake::client::generate_key;
        let uri: tokio_tungstenite::tungstenite::http::Uri = url.parse()?;
        let host = uri.host().unwrap_or("localhost").to_owned();
        let host_header = match uri.port_u16() {
            Some(p) => format!("{host}:{p}"),
            None => host,
        };
        let request = Request::builder()
            .uri(url)
            .header("Host", host_header)
            .header("Cookie", format!("session={session_token}"))
            .header("Upgrade", "websocket")
            .header("Connection", "Upgrade")
            .header("Sec-WebSocket-Version", "13")
            .header("Sec-WebSocket-Key", generate_key())
            .body(())?;
        let (ws_stream, _response) = tokio_tungstenite::connect_async(request).await?;
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Text(msg.to_frame().into())).await?;
        Ok(())
    }

    pub async fn send_raw(&mut self, frame: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Text(frame.to_owned().into())).await?;
        Ok(())
    }

    /// Receives the next frame and decodes it into its fields, without
    /// asserting it matches a known `ServerMessage` variant (useful for
    /// protocol-edge-case tests).
    pub async fn recv_raw(&mut self) -> Result<String, Box<dyn std::error::Error>> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) => return Err("connection closed by server".into()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err("connection stream ended".into()),
            }
        }
    }

    pub async fn recv(&mut self) -> Result<ServerMessage, Box<dyn std::error::Error>> {
        let text = self.recv_raw().await?;
        parse_server_message(&text).ok_or_else(|| format!("unparseable frame: {text}").into())
    }

    pub async fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Close(None)).await?;
        Ok(())
    }
}

fn parse_server_message(frame: &str) -> Option<ServerMessage> {
    let fields = cca_protocol::decode(frame);
    let cmd = fields.first()?.as_str();
    match cmd {
        "START" if fields.len() == 1 => Some(ServerMessage::Start),
        "STOP" if fields.len() == 1 => Some(ServerMessage::Stop),
        "YC" if fields.len() == 1 => Some(ServerMessage::Confirmed),
        "NC" if fields.len() == 1 => Some(ServerMessage::Unconfirmed),
        "U" if fields.len() == 1 => Some(ServerMessage::Unauthenticated),
        "HI" if fields.len() == 2 => Some(ServerMessage::Hi {
            course_ids: if fields[1].is_empty() {
                vec![]
            } else {
                fields[1].split(',').filter_map(|s| s.parse().ok()).collect()
            },
        }),
        "Y" if fields.len() == 2 => fields[1]
            .parse()
            .ok()
            .map(|course_id| ServerMessage::Accepted { course_id }),
        "N" if fields.len() == 2 => fields[1]
            .parse()
            .ok()
            .map(|course_id| ServerMessage::Rejected { course_id }),
        "M" if fields.len() == 3 => {
            let course_id = fields[1].parse().ok()?;
            let selected = fields[2].parse().ok()?;
            Some(ServerMessage::SeatCount { course_id, selected })
        }
        "R" if fields.len() == 3 => {
            let course_id = fields[1].parse().ok()?;
            match fields[2].as_str() {
                "Full" => Some(ServerMessage::Full { course_id }),
                "Group conflict" => Some(ServerMessage::GroupConflict { course_id }),
                _ => None,
            }
        }
        "RC" if fields.len() == 2 => Some(ServerMessage::ConfirmRejected {
            reason: fields[1].clone(),
        }),
        "E" if fields.len() == 2 => Some(ServerMessage::Error {
            reason: fields[1].clone(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seat_count_and_rejections() {
        assert_eq!(
            parse_server_message("M 42 7"),
            Some(ServerMessage::SeatCount {
                course_id: 42,
                selected: 7
            })
        );
        assert_eq!(
            parse_server_message("R 42 :Full"),
            Some(ServerMessage::Full { course_id: 42 })
        );
        assert_eq!(
            parse_server_message("R 11 :Group conflict"),
            Some(ServerMessage::GroupConflict { course_id: 11 })
        );
    }

    #[test]
    fn parses_hi_with_empty_and_nonempty_ids() {
        assert_eq!(
            parse_server_message("HI :"),
            Some(ServerMessage::Hi { course_ids: vec![] })
        );
        assert_eq!(
            parse_server_message("HI :1,2,3"),
            Some(ServerMessage::Hi {
                course_ids: vec![1, 2, 3]
            })
        );
    }
}
