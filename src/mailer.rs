//! Outbound mail over SMTP. Sending is blocking; callers run it on the
//! blocking pool.

use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpConfig;

pub struct PdfAttachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub struct Mail {
    pub to: String,
    /// Used when `SMTP_FROM` is not configured.
    pub fallback_from: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<PdfAttachment>,
}

pub fn send(smtp: &SmtpConfig, mail: Mail) -> Result<()> {
    let from: Mailbox = smtp
        .from
        .as_deref()
        .unwrap_or(&mail.fallback_from)
        .parse()
        .context("invalid sender address")?;
    let to: Mailbox = mail.to.parse().context("invalid recipient address")?;

    let builder = Message::builder().from(from).to(to).subject(mail.subject);
    let message = match mail.attachment {
        Some(pdf) => {
            let content_type = ContentType::parse("application/pdf").context("invalid content type")?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(mail.body))
                    .singlepart(Attachment::new(pdf.filename).body(pdf.bytes, content_type)),
            )?
        }
        None => builder.body(mail.body)?,
    };

    let transport = if smtp.secure {
        SmtpTransport::relay(&smtp.host)
    } else {
        SmtpTransport::starttls_relay(&smtp.host)
    }
    .with_context(|| format!("cannot reach SMTP host {}", smtp.host))?
    .port(smtp.port);

    let transport = match (&smtp.username, &smtp.password) {
        (Some(user), Some(pass)) => transport.credentials(Credentials::new(user.clone(), pass.clone())),
        _ => transport,
    };

    transport.build().send(&message).context("SMTP send failed")?;
    Ok(())
}

/// The mail carrying a freshly issued prescription.
pub fn prescription_mail(
    to: String,
    patient_name: Option<&str>,
    doctor_name: Option<&str>,
    doctor_email: Option<&str>,
    attachment: PdfAttachment,
) -> Mail {
    let doctor = doctor_name.unwrap_or("your doctor");
    Mail {
        to,
        fallback_from: doctor_email.unwrap_or("no-reply@localhost").to_string(),
        subject: format!("Prescription from {doctor}"),
        body: format!(
            "Dear {},\n\nPlease find your prescription attached.\n\nRegards, {doctor}",
            patient_name.unwrap_or("Patient")
        ),
        attachment: Some(attachment),
    }
}

pub fn password_reset_mail(to: String, frontend_url: &str, token: &str) -> Mail {
    let link = format!("{}/reset-password?token={token}", frontend_url.trim_end_matches('/'));
    Mail {
        to,
        fallback_from: "no-reply@localhost".to_string(),
        subject: "Password Reset".to_string(),
        body: format!(
            "A password reset was requested for your account.\n\nReset your password here (valid for one hour):\n{link}\n\nIf you did not request this, ignore this email."
        ),
        attachment: None,
    }
}
