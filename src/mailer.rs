use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::MailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: String) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: lettre::message::Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        let from = format!("{} <{}>", cfg.sender_name, cfg.from).parse()?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: String) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// HTML body of the account-confirmation email.
pub fn confirmation_email(base_url: &str, username: &str, token: &str) -> String {
    format!(
        r#"<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <p>Hi {username},</p>
    <p>Thanks for signing up. Please confirm your email address to activate your account:</p>
    <p><a href="{base_url}auth/confirmed_email/{token}">Confirm email</a></p>
    <p>If you did not create this account, you can ignore this message.</p>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_email_embeds_link() {
        let body = confirmation_email("http://localhost:8080/", "borys", "tok-123");
        assert!(body.contains("Hi borys"));
        assert!(body.contains("http://localhost:8080/auth/confirmed_email/tok-123"));
    }
}
