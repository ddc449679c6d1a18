use crate::config::Config;
use lettre::address::AddressError;
use lettre::message::header::{ContentType, ContentTypeErr};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use std::fmt::Display;
use thiserror::Error;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: AddressError,
    },

    #[error("no email recipients configured")]
    NoRecipients,

    #[error("invalid attachment content type: {0}")]
    ContentType(#[from] ContentTypeErr),

    #[error("failed to build email: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("failed to set up SMTP transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("failed to send email: {0}")]
    Send(String),
}

/// A generated timesheet on its way to the office
#[derive(Debug, Clone)]
pub struct TimesheetMail {
    pub name: String,
    pub month: String,
    pub file_name: String,
    pub data: Vec<u8>,
    /// Extra addresses receiving a copy
    pub cc: Vec<String>,
}

/// Anything that can deliver a [`TimesheetMail`]
pub trait SendTimesheet: Send + Sync {
    fn send_timesheet(&self, mail: &TimesheetMail) -> Result<(), MailError>;
}

/// Sends timesheets to a fixed list of recipients through a lettre transport
pub struct Mailer<T = SmtpTransport> {
    transport: T,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl Mailer<SmtpTransport> {
    /// Build an SMTP mailer from the email settings of `config`
    ///
    /// Port 465 uses implicit TLS, any other port upgrades with STARTTLS.
    pub fn from_config(config: &Config) -> Result<Self, MailError> {
        let host = config.smtp_host.as_str();
        let builder = if config.smtp_port == 465 {
            let tls_parameters = TlsParameters::new(host.to_string())?;
            SmtpTransport::relay(host)?.tls(Tls::Wrapper(tls_parameters))
        } else {
            SmtpTransport::starttls_relay(host)?
        };

        let mut builder = builder.port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        let from = sender_mailbox(&config.email_from_name, &config.email_from_email)?;
        let recipients = config
            .recipients()
            .iter()
            .map(|address| parse_mailbox(address))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Mailer::new(builder.build(), from, recipients))
    }
}

impl<T> Mailer<T> {
    pub fn new(transport: T, from: Mailbox, recipients: Vec<Mailbox>) -> Self {
        Self {
            transport,
            from,
            recipients,
        }
    }

    /// Assemble the message with the timesheet attached
    pub fn build_message(&self, mail: &TimesheetMail) -> Result<Message, MailError> {
        if self.recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(format!("Timesheet Report: {} - Month {}", mail.name, mail.month));
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        for copy in &mail.cc {
            builder = builder.cc(parse_mailbox(copy)?);
        }

        let body = format!(
            "Attached is the timesheet report for {} for month {}.\n\nThis email was sent automatically from the Timesheet Filler application.",
            mail.name, mail.month
        );
        let attachment = Attachment::new(mail.file_name.clone())
            .body(mail.data.clone(), ContentType::parse(XLSX_CONTENT_TYPE)?);

        let message = builder.multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body))
                .singlepart(attachment),
        )?;

        Ok(message)
    }
}

impl<T> SendTimesheet for Mailer<T>
where
    T: Transport + Send + Sync,
    T::Error: Display,
{
    fn send_timesheet(&self, mail: &TimesheetMail) -> Result<(), MailError> {
        let message = self.build_message(mail)?;
        self.transport
            .send(&message)
            .map_err(|e| MailError::Send(e.to_string()))?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|source| MailError::Address {
            address: address.to_string(),
            source,
        })
}

fn sender_mailbox(name: &str, address: &str) -> Result<Mailbox, MailError> {
    let email = address.trim().parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })?;
    let name = (!name.is_empty()).then(|| name.to_string());
    Ok(Mailbox::new(name, email))
}

/// Loose sanity check for an address typed into the download form
///
/// Requires something before the `@` and a domain of at least three
/// characters containing a dot after its first character.
pub fn is_valid_email(email: &str) -> bool {
    let Some(at) = email.find('@') else {
        return false;
    };
    if at < 1 {
        return false;
    }

    let domain = &email[at + 1..];
    domain.len() >= 3 && domain.find('.').is_some_and(|dot| dot >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lettre::transport::stub::StubTransport;

    fn mail() -> TimesheetMail {
        TimesheetMail {
            name: "Test User".to_string(),
            month: "1".to_string(),
            file_name: "Gorily_vykaz-prace_012023_User_Test.xlsx".to_string(),
            data: b"xlsx".to_vec(),
            cc: Vec::new(),
        }
    }

    fn mailer(transport: StubTransport) -> Mailer<StubTransport> {
        Mailer::new(
            transport,
            sender_mailbox("Timesheet Filler", "timesheets@example.com").unwrap(),
            vec![parse_mailbox("office@example.com").unwrap()],
        )
    }

    #[test]
    fn message_carries_subject_and_attachment() {
        let mut mail = mail();
        mail.cc.push("me@example.org".to_string());

        let message = mailer(StubTransport::new_ok()).build_message(&mail).unwrap();
        let text = String::from_utf8(message.formatted()).unwrap();

        assert!(text.contains("Subject: Timesheet Report: Test User - Month 1"));
        assert!(text.contains("To: office@example.com"));
        assert!(text.contains("Cc: me@example.org"));
        assert!(text.contains("Gorily_vykaz-prace_012023_User_Test.xlsx"));
        assert!(text.contains(XLSX_CONTENT_TYPE));
    }

    #[test]
    fn transport_failures_are_reported() {
        assert!(mailer(StubTransport::new_ok()).send_timesheet(&mail()).is_ok());

        let err = mailer(StubTransport::new_error())
            .send_timesheet(&mail())
            .unwrap_err();
        assert!(matches!(err, MailError::Send(_)));
    }

    #[test]
    fn empty_recipient_list_is_rejected() {
        let mailer = Mailer::new(
            StubTransport::new_ok(),
            sender_mailbox("", "timesheets@example.com").unwrap(),
            Vec::new(),
        );
        assert!(matches!(
            mailer.build_message(&mail()),
            Err(MailError::NoRecipients)
        ));
    }

    #[test]
    fn bad_cc_address_is_rejected() {
        let mut mail = mail();
        mail.cc.push("not an address".to_string());
        let err = mailer(StubTransport::new_ok()).build_message(&mail).unwrap_err();
        assert!(matches!(err, MailError::Address { .. }));
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("jan@example.com"));
        assert!(is_valid_email("a@b.cz"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jan@"));
        assert!(!is_valid_email("jan@.com"));
        assert!(!is_valid_email("jan@localhost"));
        assert!(!is_valid_email("jan.example.com"));
    }
}
