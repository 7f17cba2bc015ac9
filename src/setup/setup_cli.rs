use blogicum_backend::config::Config;
use blogicum_backend::models::db_operations::{categories_db_operations, posts_db_operations, users_db_operations};
use blogicum_backend::setup::db_setup;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for setting up and curating the blog.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    Location {
        #[command(subcommand)]
        action: LocationAction,
    },
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    Post {
        #[command(subcommand)]
        action: PostAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Create the category hidden from readers.
        #[arg(long)]
        hidden: bool,
    },
    Publish {
        #[arg(long)]
        slug: String,
    },
    Hide {
        #[arg(long)]
        slug: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum LocationAction {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        hidden: bool,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
    },
}

#[derive(Subcommand, Debug)]
enum PostAction {
    Publish {
        #[arg(long)]
        id: i64,
    },
    Hide {
        #[arg(long)]
        id: i64,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    if let Commands::Db { action: DbAction::Setup } = &cli.command {
        setup_blog_database(&config);
        return;
    }

    let Some(conn) = open_existing(&config) else {
        return;
    };

    match &cli.command {
        Commands::Db { .. } => {}
        Commands::Category { action } => match action {
            CategoryAction::Create { title, slug, description, hidden } => {
                match categories_db_operations::create_category(&conn, title, description, slug, !hidden, Utc::now()) {
                    Ok(id) => println!("✅ Category '{}' created with id {}.", slug, id),
                    Err(e) => eprintln!("❌ Error creating category: {}. The slug might already be taken.", e),
                }
            }
            CategoryAction::Publish { slug } => set_category_visibility(&conn, slug, true),
            CategoryAction::Hide { slug } => set_category_visibility(&conn, slug, false),
            CategoryAction::List => list_categories(&conn),
        },
        Commands::Location { action } => match action {
            LocationAction::Create { name, hidden } => {
                match categories_db_operations::create_location(&conn, name, !hidden, Utc::now()) {
                    Ok(id) => println!("✅ Location '{}' created with id {}.", name, id),
                    Err(e) => eprintln!("❌ Error creating location: {}", e),
                }
            }
        },
        Commands::User { action } => match action {
            UserAction::Create { username, password, email } => {
                match users_db_operations::create_user(&conn, username, password, email, Utc::now()) {
                    Ok(id) => println!("✅ User '{}' created with id {}.", username, id),
                    Err(e) => eprintln!("❌ Error creating user: {}. It might be because the username already exists.", e),
                }
            }
        },
        Commands::Post { action } => match action {
            PostAction::Publish { id } => set_post_visibility(&conn, *id, true),
            PostAction::Hide { id } => set_post_visibility(&conn, *id, false),
        },
    }
}

fn setup_blog_database(config: &Config) {
    let db_path = config.blog_db_path();
    println!("\nSetting up blog database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            eprintln!("❌ Could not create database directory: {}", e);
            return;
        }
    }
    let images_dir = PathBuf::from(&config.media_path).join("posts");
    if let Err(e) = fs::create_dir_all(&images_dir) {
        eprintln!("❌ Could not create media directory '{}': {}", images_dir.display(), e);
        return;
    }

    let mut conn = match Connection::open(&db_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Could not open database file: {}", e);
            return;
        }
    };
    match db_setup::setup_blog_db(&mut conn) {
        Ok(_) => println!("✅ Blog database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up blog database: {}", e),
    }
}

fn open_existing(config: &Config) -> Option<Connection> {
    let db_path = config.blog_db_path();
    if !db_path.exists() {
        eprintln!("❌ Error: Blog database not found at '{}'. Please run `setup_cli db setup` first.", db_path.display());
        return None;
    }
    let opened = Connection::open(&db_path)
        .and_then(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;").map(|_| conn));
    match opened {
        Ok(conn) => Some(conn),
        Err(e) => {
            eprintln!("❌ Error opening blog database: {}", e);
            None
        }
    }
}

fn set_category_visibility(conn: &Connection, slug: &str, is_published: bool) {
    let label = if is_published { "published" } else { "hidden" };
    match categories_db_operations::set_category_published(conn, slug, is_published) {
        Ok(0) => eprintln!("❌ Error: No category with slug '{}' found.", slug),
        Ok(_) => println!("✅ Category '{}' is now {}.", slug, label),
        Err(e) => eprintln!("❌ Error updating category: {}", e),
    }
}

fn set_post_visibility(conn: &Connection, post_id: i64, is_published: bool) {
    let label = if is_published { "published" } else { "hidden" };
    match posts_db_operations::set_post_published(conn, post_id, is_published) {
        Ok(0) => eprintln!("❌ Error: No post with id {} found.", post_id),
        Ok(_) => println!("✅ Post {} is now {}.", post_id, label),
        Err(e) => eprintln!("❌ Error updating post: {}", e),
    }
}

fn list_categories(conn: &Connection) {
    match categories_db_operations::read_all_categories(conn) {
        Ok(categories) => {
            println!("Listing Categories:");
            for category in categories {
                let marker = if category.is_published { "" } else { " (hidden)" };
                println!("- {} [{}]{}", category.title, category.slug, marker);
            }
        }
        Err(e) => eprintln!("❌ Error fetching categories: {}", e),
    }
}
