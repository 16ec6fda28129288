//! Required-field checks mirroring the portal forms.

use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::schema::NewClient;

/// Trimmed value of a required field.
pub fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(HelpdeskError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed)
}

pub fn credentials(email: &str, password: &str) -> Result<()> {
    required("email", email)?;
    // Passwords are not trimmed, only checked for content.
    if password.is_empty() {
        return Err(HelpdeskError::Validation("password is required".into()));
    }
    Ok(())
}

pub fn new_client(client: &NewClient) -> Result<()> {
    required("name", &client.name)?;
    required("first name", &client.contact_info.first_name)?;
    required("last name", &client.contact_info.last_name)?;
    required("email", &client.contact_info.email)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::testing::{new_client as client_fixture, validation_error_for_field};

    #[test]
    fn test_required_trims() {
        assert_eq!(required("title", "  VPN down ").unwrap(), "VPN down");
        let err = required("title", "   ").unwrap_err();
        assert!(validation_error_for_field(&err, "title"));
    }

    #[test]
    fn test_credentials() {
        assert!(credentials("a@example.com", "secret").is_ok());
        assert!(credentials(" ", "secret").is_err());
        let err = credentials("a@example.com", "").unwrap_err();
        assert!(validation_error_for_field(&err, "password"));
    }

    #[test]
    fn test_new_client_fields() {
        let mut client = client_fixture("Acme");
        assert!(new_client(&client).is_ok());

        client.contact_info.last_name = " ".into();
        let err = new_client(&client).unwrap_err();
        assert!(validation_error_for_field(&err, "last name"));
    }
}
