use aichatbase::config::Config;
use aichatbase::models::auth::{normalize_email, SUPER_ADMIN_ROLE};
use bcrypt::{hash, DEFAULT_COST};
use dotenvy::dotenv;
use sqlx::{postgres::PgPoolOptions, Row};
use std::io::{self, Write};
use uuid::Uuid;

fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("AIChatBase - Create Super Admin");
    println!("==========================================");

    dotenv().ok();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;
    aichatbase::db::run_migrations(&pool).await?;

    let email = normalize_email(&prompt("Email address: ")?);
    if email.is_empty() || !email.contains('@') {
        eprintln!("Invalid email address");
        return Ok(());
    }

    let name = prompt("Name (optional): ")?;
    let name = if name.is_empty() { None } else { Some(name) };

    let existing_user = sqlx::query("SELECT id FROM users WHERE lower(email) = $1")
        .bind(&email)
        .fetch_optional(&pool)
        .await?;
    if existing_user.is_some() {
        eprintln!("User with this email already exists");
        return Ok(());
    }

    print!("Password: ");
    io::stdout().flush()?;
    let password = rpassword::read_password()?;
    if password.len() < 6 {
        eprintln!("Password must be at least 6 characters long");
        return Ok(());
    }

    print!("Password (again): ");
    io::stdout().flush()?;
    let password_confirm = rpassword::read_password()?;
    if password != password_confirm {
        eprintln!("Passwords don't match");
        return Ok(());
    }

    let password_hash = hash(&password, DEFAULT_COST)?;
    let org_name = format!("{}'s Organization", name.as_deref().unwrap_or(&email));

    let mut tx = pool.begin().await?;

    let organization_id: Uuid = sqlx::query_scalar("INSERT INTO organizations (name) VALUES ($1) RETURNING id")
        .bind(&org_name)
        .fetch_one(&mut *tx)
        .await?;

    let row = sqlx::query(
        "INSERT INTO users (name, email, password_hash, organization_id)
         VALUES ($1, $2, $3, $4)
         RETURNING id, email",
    )
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .bind(organization_id)
    .fetch_one(&mut *tx)
    .await?;
    let user_id: Uuid = row.get("id");

    let granted = sqlx::query("INSERT INTO user_roles (user_id, role_id) SELECT $1, id FROM roles WHERE name = $2")
        .bind(user_id)
        .bind(SUPER_ADMIN_ROLE)
        .execute(&mut *tx)
        .await?;
    if granted.rows_affected() == 0 {
        eprintln!("Role '{}' is missing; run the migrations first", SUPER_ADMIN_ROLE);
        return Ok(());
    }

    tx.commit().await?;

    let stored_email: String = row.get("email");
    println!();
    println!("Super Admin created successfully!");
    println!("   ID: {}", user_id);
    println!("   Email: {}", stored_email);
    println!("   Organization: {}", org_name);
    println!();
    println!("Log in through POST /api/auth/login with the credentials you just created");

    pool.close().await;
    Ok(())
}
