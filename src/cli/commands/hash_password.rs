use anyhow::Result;

/// Prints the bcrypt hash of `password`, for seeding users by hand.
pub fn hash_password(password: &str) -> Result<()> {
    println!("{}", crate::auth::hash_password(password)?);
    Ok(())
}
