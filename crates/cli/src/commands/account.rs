//! Account commands: login, logout, registration and profile.

use tienda_storefront::Storefront;
use tienda_storefront::api::{PasswordChange, ProfileUpdate, Registration};
use tienda_storefront::error::StorefrontError;

use super::{CliError, secret};
use crate::output;

pub async fn login(
    storefront: &mut Storefront,
    email: &str,
    password: Option<String>,
) -> Result<(), CliError> {
    let password = secret("Password", password)?;
    let user = storefront.login(email, password).await?;
    output::profile(&user);
    output::cart(storefront.cart());
    Ok(())
}

pub fn logout(storefront: &mut Storefront) -> Result<(), CliError> {
    storefront.logout()?;
    Ok(())
}

pub async fn whoami(storefront: &mut Storefront) -> Result<(), CliError> {
    match storefront.start().await? {
        Some(user) => output::profile(&user),
        None => output::line("Not signed in"),
    }
    Ok(())
}

pub async fn register(
    storefront: &mut Storefront,
    name: &str,
    email: &str,
    password: Option<String>,
    phone: Option<&str>,
    address: Option<&str>,
) -> Result<(), CliError> {
    let password = secret("Password", password)?;
    let registration = Registration::new(name, email, password, phone, address)
        .map_err(StorefrontError::from)?;

    let message = storefront.register(&registration).await?;
    output::line(&message);
    Ok(())
}

pub async fn show_profile(storefront: &mut Storefront) -> Result<(), CliError> {
    require_session(storefront).await?;
    let user = storefront.profile().await?;
    output::profile(&user);
    Ok(())
}

pub async fn update_profile(
    storefront: &mut Storefront,
    name: &str,
    phone: Option<&str>,
    address: Option<&str>,
) -> Result<(), CliError> {
    let update = ProfileUpdate::new(name, phone, address).map_err(StorefrontError::from)?;
    require_session(storefront).await?;

    let user = storefront.update_profile(&update).await?;
    output::profile(&user);
    Ok(())
}

pub async fn change_password(storefront: &mut Storefront) -> Result<(), CliError> {
    require_session(storefront).await?;

    let current = secret("Current password", None)?;
    let new = secret("New password", None)?;
    let confirmation = secret("Confirm new password", None)?;
    let change = PasswordChange::new(current, new, &confirmation).map_err(StorefrontError::from)?;

    let message = storefront.change_password(&change).await?;
    output::line(&message);
    Ok(())
}

/// Restore the session, failing early for anonymous visitors.
pub(super) async fn require_session(storefront: &mut Storefront) -> Result<(), CliError> {
    match storefront.start().await? {
        Some(_) => Ok(()),
        None => Err(StorefrontError::NotSignedIn.into()),
    }
}
