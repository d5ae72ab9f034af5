use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::channels::adapter::{Channel, ChannelError, ChannelType};
use crate::config::EmailChannelConfig;
use crate::notifications::types::Contact;

const SUBJECT: &str = "Notification";

/// Plain SMTP submission, one connection per message.
#[derive(Debug, Clone)]
pub struct EmailChannel {
    address: String,
    from: String,
    helo: String,
    timeout: Duration,
}

impl EmailChannel {
    pub fn new(config: &EmailChannelConfig) -> Self {
        Self {
            address: format!("{}:{}", config.host(), config.port()),
            from: config.from(),
            helo: config.helo(),
            timeout: Duration::from_millis(config.timeout_ms()),
        }
    }

    async fn deliver(&self, to: &str, message: &str) -> Result<(), ChannelError> {
        let mut session = SmtpSession::connect(&self.address).await?;
        session.expect(&[220]).await?;
        session
            .command(&format!("HELO {}", self.helo), &[250])
            .await?;
        session
            .command(&format!("MAIL FROM:<{}>", self.from), &[250])
            .await?;
        session
            .command(&format!("RCPT TO:<{to}>"), &[250, 251])
            .await?;
        session.command("DATA", &[354]).await?;
        let body = render_message(&self.from, to, message);
        session.write(&body).await?;
        session.expect(&[250]).await?;
        // The message is accepted at this point; a failed QUIT changes nothing.
        let _ = session.command("QUIT", &[221]).await;
        Ok(())
    }

    async fn probe(&self) -> Result<(), ChannelError> {
        let mut session = SmtpSession::connect(&self.address).await?;
        session.expect(&[220]).await?;
        session.command("QUIT", &[221]).await
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Email
    }

    async fn send(&self, contact: &Contact, message: &str) -> Result<(), ChannelError> {
        let Contact::Email(address) = contact else {
            return Err(ChannelError::Unsupported(contact.to_string()));
        };
        tokio::time::timeout(self.timeout, self.deliver(address, message))
            .await
            .map_err(|_| ChannelError::Timeout(self.timeout))?
    }

    async fn check_health(&self) -> Result<(), ChannelError> {
        tokio::time::timeout(self.timeout, self.probe())
            .await
            .map_err(|_| ChannelError::Timeout(self.timeout))?
    }
}

struct SmtpSession {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl SmtpSession {
    async fn connect(address: &str) -> Result<Self, ChannelError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|err| ChannelError::Transport(format!("connect {address}: {err}")))?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer,
        })
    }

    async fn write(&mut self, data: &str) -> Result<(), ChannelError> {
        self.writer
            .write_all(data.as_bytes())
            .await
            .map_err(|err| ChannelError::Transport(err.to_string()))
    }

    async fn command(&mut self, line: &str, accepted: &[u16]) -> Result<(), ChannelError> {
        self.write(&format!("{line}\r\n")).await?;
        self.expect(accepted).await
    }

    async fn expect(&mut self, accepted: &[u16]) -> Result<(), ChannelError> {
        let (code, text) = self.read_reply().await?;
        if accepted.contains(&code) {
            Ok(())
        } else {
            Err(ChannelError::Rejected(format!("{code} {text}")))
        }
    }

    async fn read_reply(&mut self) -> Result<(u16, String), ChannelError> {
        let mut text = Vec::new();
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|err| ChannelError::Transport(err.to_string()))?;
            if read == 0 {
                return Err(ChannelError::Transport("connection closed".to_string()));
            }
            let line = line.trim_end();
            if line.len() < 3 {
                return Err(ChannelError::Transport(format!("malformed reply: {line}")));
            }
            let code = line
                .get(..3)
                .and_then(|code| code.parse::<u16>().ok())
                .ok_or_else(|| ChannelError::Transport(format!("malformed reply: {line}")))?;
            let rest = line.get(4..).unwrap_or_default();
            text.push(rest.to_string());
            if line.as_bytes().get(3) != Some(&b'-') {
                return Ok((code, text.join(" ")));
            }
        }
    }
}

fn render_message(from: &str, to: &str, message: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("From: <{from}>\r\n"));
    out.push_str(&format!("To: <{to}>\r\n"));
    out.push_str(&format!("Subject: {SUBJECT}\r\n"));
    out.push_str(&format!("Date: {}\r\n", chrono::Utc::now().to_rfc2822()));
    out.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
    for line in message.lines() {
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out.push_str(".\r\n");
    out
}
