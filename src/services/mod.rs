//! Business logic services

pub mod books;
pub mod borrows;
pub mod counters;
pub mod email;
pub mod revision_papers;
pub mod rooms;
pub mod shelves;
pub mod stats;
pub mod students;
pub mod users;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

/// Trimmed value of a required text field; blank input is rejected
pub(crate) fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} cannot be blank", field)));
    }
    Ok(value.to_string())
}

/// [`required`] for a field that may be left out of a partial update
pub(crate) fn required_change(field: &str, value: Option<String>) -> AppResult<Option<String>> {
    value.map(|v| required(field, &v)).transpose()
}

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub counters: counters::CounterService,
    pub rooms: rooms::RoomsService,
    pub shelves: shelves::ShelvesService,
    pub books: books::BooksService,
    pub students: students::StudentsService,
    pub borrows: borrows::BorrowsService,
    pub revision_papers: revision_papers::RevisionPapersService,
    pub users: users::UsersService,
    pub stats: stats::StatsService,
    pub email: email::EmailService,
}

impl Services {
    /// Create all services over the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let counters = counters::CounterService::new(repository.clone());
        let email = email::EmailService::new(config.email.clone());

        Self {
            rooms: rooms::RoomsService::new(repository.clone()),
            shelves: shelves::ShelvesService::new(repository.clone()),
            books: books::BooksService::new(repository.clone(), counters.clone()),
            students: students::StudentsService::new(repository.clone(), counters.clone()),
            borrows: borrows::BorrowsService::new(
                repository.clone(),
                counters.clone(),
                config.library.clone(),
            ),
            revision_papers: revision_papers::RevisionPapersService::new(repository.clone()),
            users: users::UsersService::new(repository.clone(), config.auth.clone(), email.clone()),
            stats: stats::StatsService::new(repository, config.library.clone()),
            counters,
            email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("ISBN", "  978-9966  ").unwrap(), "978-9966");
        assert!(matches!(required("ISBN", "   "), Err(AppError::Validation(_))));
        assert!(matches!(required("ISBN", "\t\n"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_required_change_keeps_missing_fields() {
        assert_eq!(required_change("Title", None).unwrap(), None);
        assert_eq!(
            required_change("Title", Some(" Blossoms ".to_string())).unwrap(),
            Some("Blossoms".to_string())
        );
        assert!(required_change("Title", Some(" ".to_string())).is_err());
    }
}
