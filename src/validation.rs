//! Request body validation
//!
//! Each check returns the first failing rule as `InvalidParams`, with the
//! form-level message the dashboard shows next to the field.

use crate::constants::{MIN_PASSWORD_LEN, RE_EMAIL};
use crate::error::{AppError, AppResult};
use crate::models::{
    CategoryInput, CreateScheduleRequest, CreateTaskRequest, CreateUserRequest, InvoiceInput,
    ProjectInput, TransactionInput, UpdateScheduleRequest, UpdateUserRequest,
};

fn require(condition: bool, message: &str) -> AppResult<()> {
    if condition {
        Ok(())
    } else {
        Err(AppError::invalid_params(message))
    }
}

fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn is_valid_email(email: &str) -> bool {
    RE_EMAIL.is_match(email.trim())
}

pub fn validate_new_user(req: &CreateUserRequest) -> AppResult<()> {
    require(not_blank(&req.name), "İsim gereklidir")?;
    require(is_valid_email(&req.email), "Geçerli bir email giriniz")?;
    validate_password(&req.password)
}

pub fn validate_user_edit(req: &UpdateUserRequest) -> AppResult<()> {
    require(not_blank(&req.name), "İsim gereklidir")?;
    require(is_valid_email(&req.email), "Geçerli bir email giriniz")?;
    match req.password.as_deref() {
        Some(p) if !p.is_empty() => validate_password(p),
        _ => Ok(()),
    }
}

pub fn validate_password(password: &str) -> AppResult<()> {
    require(
        password.chars().count() >= MIN_PASSWORD_LEN,
        "Şifre en az 6 karakter olmalıdır",
    )
}

pub fn validate_category(input: &CategoryInput) -> AppResult<()> {
    require(not_blank(&input.name), "Kategori adı gereklidir")?;
    require(not_blank(&input.color), "Renk gereklidir")
}

pub fn validate_transaction(input: &TransactionInput) -> AppResult<()> {
    require(
        input.amount.is_finite() && input.amount > 0.0,
        "Tutar pozitif olmalıdır",
    )?;
    require(not_blank(&input.description), "Açıklama gereklidir")?;
    require(not_blank(&input.category_id), "Kategori seçiniz")
}

pub fn validate_invoice(input: &InvoiceInput) -> AppResult<()> {
    require(not_blank(&input.client_name), "Müşteri adı gereklidir")?;
    if let Some(email) = input.client_email.as_deref().filter(|e| !e.is_empty()) {
        require(is_valid_email(email), "Geçerli bir email giriniz")?;
    }
    require(!input.items.is_empty(), "En az bir ürün eklenmelidir")?;
    for item in &input.items {
        require(not_blank(&item.description), "Açıklama gereklidir")?;
        require(
            item.quantity.is_finite() && item.quantity > 0.0,
            "Miktar pozitif olmalıdır",
        )?;
        require(
            item.unit_price.is_finite() && item.unit_price >= 0.0,
            "Birim fiyat 0 veya daha büyük olmalıdır",
        )?;
    }
    Ok(())
}

pub fn validate_project(input: &ProjectInput) -> AppResult<()> {
    require(not_blank(&input.name), "Proje adı gereklidir")?;
    require(not_blank(&input.color), "Renk gereklidir")?;
    if let Some(budget) = input.budget {
        require(budget.is_finite() && budget >= 0.0, "Bütçe negatif olamaz")?;
    }
    if let (Some(start), Some(end)) = (input.start_date, input.end_date) {
        require(end >= start, "Bitiş tarihi başlangıçtan önce olamaz")?;
    }
    Ok(())
}

pub fn validate_task(input: &CreateTaskRequest) -> AppResult<()> {
    require(not_blank(&input.title), "Başlık gereklidir")?;
    require(not_blank(&input.project_id), "Proje seçiniz")
}

pub fn validate_comment(content: &str) -> AppResult<()> {
    require(not_blank(content), "Yorum boş olamaz")
}

pub fn validate_recipients(recipients: &[String]) -> AppResult<()> {
    require(!recipients.is_empty(), "En az bir alıcı gereklidir")?;
    for r in recipients {
        if !is_valid_email(r) {
            return Err(AppError::invalid_params(format!("Geçersiz email adresi: {}", r)));
        }
    }
    Ok(())
}

pub fn validate_schedule(req: &CreateScheduleRequest) -> AppResult<()> {
    require(not_blank(&req.name), "Rapor adı gereklidir")?;
    validate_recipients(&req.recipients)
}

pub fn validate_schedule_update(req: &UpdateScheduleRequest) -> AppResult<()> {
    if let Some(name) = &req.name {
        require(not_blank(name), "Rapor adı gereklidir")?;
    }
    match &req.recipients {
        Some(recipients) => validate_recipients(recipients),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::{InvoiceItemInput, ReportFrequency};
    use chrono::Utc;

    fn invoice(items: Vec<InvoiceItemInput>) -> InvoiceInput {
        InvoiceInput {
            client_name: "Acme".to_string(),
            client_email: Some(String::new()),
            issue_date: Utc::now(),
            due_date: Utc::now(),
            notes: None,
            items,
            status: None,
        }
    }

    fn item(quantity: f64, unit_price: f64) -> InvoiceItemInput {
        InvoiceItemInput {
            description: "Danışmanlık".to_string(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn short_password_rejected() {
        let err = validate_password("12345").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn user_edit_allows_empty_password() {
        let req = UpdateUserRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: Some(String::new()),
            role: None,
        };
        assert!(validate_user_edit(&req).is_ok());
    }

    #[test]
    fn invoice_items_checked() {
        assert!(validate_invoice(&invoice(vec![item(1.0, 0.0)])).is_ok());
        assert!(validate_invoice(&invoice(vec![])).is_err());
        assert!(validate_invoice(&invoice(vec![item(0.0, 10.0)])).is_err());
        assert!(validate_invoice(&invoice(vec![item(2.0, -1.0)])).is_err());
    }

    #[test]
    fn recipients_must_be_emails() {
        let req = CreateScheduleRequest {
            name: "Günlük".to_string(),
            frequency: ReportFrequency::Daily,
            recipients: vec!["a@example.com".to_string(), "broken".to_string()],
            is_active: None,
        };
        let err = validate_schedule(&req).unwrap_err();
        assert!(err.message.contains("broken"));
        assert!(validate_recipients(&[]).is_err());
    }
}
