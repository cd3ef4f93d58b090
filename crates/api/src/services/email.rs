//! Email service for verification codes and order notifications.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and text templates.
//! Without SMTP settings the service runs disabled: codes are written to the
//! log instead and order emails are skipped.

use askama::Template;
use chrono::Utc;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use oxytoxin_core::{Email, VerificationCode};

use crate::config::EmailConfig;
use crate::models::delivery::DeliverySnapshot;
use crate::models::order::Order;
use crate::services::registration::CODE_TTL_MINUTES;

/// One order line, preformatted for templates.
#[derive(Debug, Clone)]
struct EmailLine {
    name: String,
    color: String,
    quantity: u32,
    unit_price: String,
    total: String,
}

#[derive(Template)]
#[template(path = "email/verification_code.html")]
struct VerificationCodeHtml<'a> {
    name: &'a str,
    code: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/verification_code.txt")]
struct VerificationCodeText<'a> {
    name: &'a str,
    code: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    name: &'a str,
    code: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    name: &'a str,
    code: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    order_id: i32,
    lines: &'a [EmailLine],
    total: &'a str,
    payment_ref: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    order_id: i32,
    lines: &'a [EmailLine],
    total: &'a str,
    payment_ref: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_notification.html")]
struct OrderNotificationHtml<'a> {
    name: &'a str,
    customer_email: &'a str,
    order_id: i32,
    lines: &'a [EmailLine],
    total: &'a str,
    payment_ref: &'a str,
    delivery: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_notification.txt")]
struct OrderNotificationText<'a> {
    name: &'a str,
    customer_email: &'a str,
    order_id: i32,
    lines: &'a [EmailLine],
    total: &'a str,
    payment_ref: &'a str,
    delivery: &'a str,
}

#[derive(Template)]
#[template(path = "email/test_email.html")]
struct TestEmailHtml<'a> {
    sent_at: &'a str,
}

#[derive(Template)]
#[template(path = "email/test_email.txt")]
struct TestEmailText<'a> {
    sent_at: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// SMTP is not configured.
    #[error("email delivery is not configured")]
    Disabled,
}

#[derive(Clone)]
struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    owner_address: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Option<Mailer>,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be set up.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer: Some(Mailer {
                transport,
                from_address: config.from_address.clone(),
                owner_address: config.owner_address.clone(),
            }),
        })
    }

    /// A service that sends nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { mailer: None }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Send an email verification code.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_verification_code(
        &self,
        to: &Email,
        name: &str,
        code: &VerificationCode,
    ) -> Result<(), EmailError> {
        let Some(mailer) = &self.mailer else {
            tracing::warn!(to = %to, code = %code, "Email disabled, verification code not sent");
            return Ok(());
        };

        let code = code.as_str();
        let minutes = CODE_TTL_MINUTES;
        let html = VerificationCodeHtml { name, code, minutes }.render()?;
        let text = VerificationCodeText { name, code, minutes }.render()?;

        mailer
            .send(
                to.as_str(),
                "Welcome to Oxytoxin - Verify Your Email",
                &text,
                &html,
            )
            .await
    }

    /// Send a password reset code.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset_code(
        &self,
        to: &Email,
        name: &str,
        code: &VerificationCode,
    ) -> Result<(), EmailError> {
        let Some(mailer) = &self.mailer else {
            tracing::warn!(to = %to, code = %code, "Email disabled, password reset code not sent");
            return Ok(());
        };

        let code = code.as_str();
        let minutes = CODE_TTL_MINUTES;
        let html = PasswordResetHtml { name, code, minutes }.render()?;
        let text = PasswordResetText { name, code, minutes }.render()?;

        mailer
            .send(to.as_str(), "Reset Your Password - Oxytoxin", &text, &html)
            .await
    }

    /// Send the customer an itemised payment confirmation.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        order: &Order,
        customer_name: &str,
    ) -> Result<(), EmailError> {
        let Some(mailer) = &self.mailer else {
            tracing::info!(order_id = %order.id, "Email disabled, skipping order confirmation");
            return Ok(());
        };

        let lines = email_lines(order);
        let total = order.total_amount.to_string();
        let payment_ref = order.payment_ref.as_deref().unwrap_or("-");
        let order_id = order.id.as_i32();

        let html = OrderConfirmationHtml {
            name: customer_name,
            order_id,
            lines: &lines,
            total: &total,
            payment_ref,
        }
        .render()?;
        let text = OrderConfirmationText {
            name: customer_name,
            order_id,
            lines: &lines,
            total: &total,
            payment_ref,
        }
        .render()?;

        mailer
            .send(
                order.user_email.as_str(),
                "Thank You for Your Purchase - Oxytoxin",
                &text,
                &html,
            )
            .await
    }

    /// Tell the store owner a paid order has come in.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_notification(
        &self,
        order: &Order,
        customer_name: &str,
    ) -> Result<(), EmailError> {
        let Some(mailer) = &self.mailer else {
            tracing::info!(order_id = %order.id, "Email disabled, skipping owner notification");
            return Ok(());
        };

        let lines = email_lines(order);
        let total = order.total_amount.to_string();
        let payment_ref = order.payment_ref.as_deref().unwrap_or("-");
        let delivery = order
            .delivery
            .as_ref()
            .map(format_delivery)
            .unwrap_or_default();
        let order_id = order.id.as_i32();
        let customer_email = order.user_email.as_str();

        let html = OrderNotificationHtml {
            name: customer_name,
            customer_email,
            order_id,
            lines: &lines,
            total: &total,
            payment_ref,
            delivery: &delivery,
        }
        .render()?;
        let text = OrderNotificationText {
            name: customer_name,
            customer_email,
            order_id,
            lines: &lines,
            total: &total,
            payment_ref,
            delivery: &delivery,
        }
        .render()?;

        mailer
            .send(&mailer.owner_address, &owner_subject(order), &text, &html)
            .await
    }

    /// Send a test message to check the SMTP setup.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Disabled` when SMTP is not configured, otherwise
    /// any delivery error.
    pub async fn send_test_email(&self, to: &Email) -> Result<(), EmailError> {
        let mailer = self.mailer.as_ref().ok_or(EmailError::Disabled)?;

        let sent_at = Utc::now().to_rfc2822();
        let html = TestEmailHtml { sent_at: &sent_at }.render()?;
        let text = TestEmailText { sent_at: &sent_at }.render()?;

        mailer
            .send(to.as_str(), "Test Email - Oxytoxin", &text, &html)
            .await
    }
}

impl Mailer {
    /// Send a multipart email with both plain text and HTML versions.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let from = format!("Oxytoxin <{}>", self.from_address);
        let email = Message::builder()
            .from(
                from.parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.transport.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

fn email_lines(order: &Order) -> Vec<EmailLine> {
    order
        .items
        .iter()
        .map(|item| EmailLine {
            name: item.name.clone(),
            color: item.color.clone().unwrap_or_default(),
            quantity: item.quantity,
            unit_price: item.price.to_string(),
            total: item.line_total().to_string(),
        })
        .collect()
}

fn owner_subject(order: &Order) -> String {
    format!("New Order Received - {}", order.total_amount)
}

fn format_delivery(delivery: &DeliverySnapshot) -> String {
    let mut parts = vec![
        delivery.full_name.clone(),
        delivery.phone_number.clone(),
        delivery.address.clone(),
        format!("{}, {}", delivery.city, delivery.state),
    ];
    parts.extend(delivery.postal_code.clone());
    parts.extend(delivery.landmark.as_ref().map(|l| format!("Landmark: {l}")));
    parts.join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use oxytoxin_core::{OrderId, OrderStatus, Price, ProductId, UserId};

    use super::*;
    use crate::models::order::OrderItem;

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(42),
            user_id: Some(UserId::new(7)),
            user_email: Email::parse("ada@example.com").unwrap(),
            items: vec![
                OrderItem {
                    product_id: ProductId::new(1),
                    name: "Acid Tee".into(),
                    image: "tee.jpg".into(),
                    price: Price::from_cents(2500),
                    color: Some("black".into()),
                    quantity: 2,
                },
                OrderItem {
                    product_id: ProductId::new(2),
                    name: "Cap".into(),
                    image: "cap.jpg".into(),
                    price: Price::from_cents(1550),
                    color: None,
                    quantity: 1,
                },
            ],
            total_amount: Price::from_cents(6550),
            status: OrderStatus::Successful,
            payment_ref: Some("PAY-123".into()),
            delivery: Some(DeliverySnapshot {
                full_name: "Ada Lovelace".into(),
                phone_number: "555-0100".into(),
                address: "12 Main St".into(),
                city: "London".into(),
                state: "LDN".into(),
                postal_code: None,
                landmark: Some("Blue door".into()),
            }),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_owner_subject_has_total() {
        assert_eq!(owner_subject(&order()), "New Order Received - $65.50");
    }

    #[test]
    fn test_email_lines() {
        let lines = email_lines(&order());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].color, "black");
        assert_eq!(lines[0].total, "$50.00");
        assert_eq!(lines[1].color, "");
    }

    #[test]
    fn test_format_delivery() {
        let delivery = order().delivery.unwrap();
        assert_eq!(
            format_delivery(&delivery),
            "Ada Lovelace, 555-0100, 12 Main St, London, LDN, Landmark: Blue door"
        );
    }

    #[test]
    fn test_verification_templates_render_code() {
        let html = VerificationCodeHtml {
            name: "Ada",
            code: "042042",
            minutes: 10,
        }
        .render()
        .unwrap();
        assert!(html.contains("042042"));
        assert!(html.contains("10 minutes"));

        let text = VerificationCodeText {
            name: "Ada",
            code: "042042",
            minutes: 10,
        }
        .render()
        .unwrap();
        assert!(text.contains("Your verification code is: 042042"));
    }

    #[test]
    fn test_confirmation_text_lists_items() {
        let order = order();
        let lines = email_lines(&order);
        let text = OrderConfirmationText {
            name: "Ada",
            order_id: 42,
            lines: &lines,
            total: "$65.50",
            payment_ref: "PAY-123",
        }
        .render()
        .unwrap();
        assert!(text.contains("Acid Tee (black) x2 @ $25.00 = $50.00"));
        assert!(text.contains("Cap x1 @ $15.50 = $15.50"));
        assert!(text.contains("Payment reference: PAY-123"));
    }

    #[test]
    fn test_notification_html_escapes_names() {
        let order = order();
        let lines = email_lines(&order);
        let html = OrderNotificationHtml {
            name: "<script>",
            customer_email: "ada@example.com",
            order_id: 42,
            lines: &lines,
            total: "$65.50",
            payment_ref: "PAY-123",
            delivery: "",
        }
        .render()
        .unwrap();
        assert!(!html.contains("<script>"));
        assert!(!html.contains("Deliver to"));
    }

    #[tokio::test]
    async fn test_disabled_service_skips_sending() {
        let service = EmailService::disabled();
        assert!(!service.is_enabled());
        let email = Email::parse("ada@example.com").unwrap();
        let code = VerificationCode::parse("123456").unwrap();
        assert!(service.send_verification_code(&email, "Ada", &code).await.is_ok());
        assert!(service.send_order_confirmation(&order(), "Ada").await.is_ok());
        assert!(matches!(
            service.send_test_email(&email).await,
            Err(EmailError::Disabled)
        ));
    }
}
