//! Shelf management service

use validator::Validate;

use super::{required, required_change};
use crate::{
    error::AppResult,
    models::shelf::{CreateShelf, Shelf, ShelfQuery, ShelfRecord, UpdateShelf},
    repository::Repository,
};

#[derive(Clone)]
pub struct ShelvesService {
    repository: Repository,
}

impl ShelvesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &ShelfQuery) -> AppResult<Vec<Shelf>> {
        self.repository.shelves.list(query).await
    }

    pub async fn get(&self, id: i32) -> AppResult<Shelf> {
        self.repository.shelves.get_by_id(id).await
    }

    pub async fn create(&self, shelf: CreateShelf) -> AppResult<Shelf> {
        shelf.validate()?;
        let created = self
            .repository
            .shelves
            .create(&ShelfRecord {
                shelf_name: required("Shelf name", &shelf.shelf_name)?,
                shelf_code: required("Shelf code", &shelf.shelf_code)?,
                category: required("Category", &shelf.category)?,
                max_borrow_per_student: shelf.max_borrow_per_student.unwrap_or(1),
            })
            .await?;
        tracing::info!(shelf_id = created.id, "Shelf {} created", created.shelf_code);
        Ok(created)
    }

    /// A category change is copied onto every book of the shelf
    pub async fn update(&self, id: i32, changes: UpdateShelf) -> AppResult<Shelf> {
        changes.validate()?;
        let current = self.repository.shelves.get_by_id(id).await?;
        let record = ShelfRecord {
            shelf_name: required_change("Shelf name", changes.shelf_name)?
                .unwrap_or(current.shelf_name),
            shelf_code: required_change("Shelf code", changes.shelf_code)?
                .unwrap_or(current.shelf_code),
            category: required_change("Category", changes.category)?
                .unwrap_or_else(|| current.category.clone()),
            max_borrow_per_student: changes
                .max_borrow_per_student
                .unwrap_or(current.max_borrow_per_student),
        };

        let updated = self.repository.shelves.update(id, &record).await?;
        if updated.category != current.category {
            tracing::info!(shelf_id = id, "Shelf category changed to {}", updated.category);
        }

        Ok(updated)
    }

    /// Deletes the shelf together with its books and their borrows
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.shelves.delete(id).await?;
        tracing::info!(shelf_id = id, "Shelf deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        error::AppError,
        models::book::BookRecord,
        repository::{MockBookStore, MockShelfStore},
    };

    fn novel(n: i32, shelf_id: i32) -> BookRecord {
        BookRecord {
            title: format!("Novel {}", n),
            publishers: "EAEP".to_string(),
            first_publication: 2001,
            isbn: format!("978-{}", n),
            book_number: format!("N{}", n),
            category: Some("Fiction".to_string()),
            picture: None,
            shelf_id: Some(shelf_id),
        }
    }

    fn fiction() -> CreateShelf {
        CreateShelf {
            shelf_name: "Fiction A".to_string(),
            shelf_code: "FA".to_string(),
            category: "Fiction".to_string(),
            max_borrow_per_student: None,
        }
    }

    #[tokio::test]
    async fn test_limit_defaults_to_one() {
        let service = ShelvesService::new(Repository::in_memory());
        let shelf = service.create(fiction()).await.unwrap();
        assert_eq!(shelf.max_borrow_per_student, 1);
        assert_eq!(shelf.shelf_count, 0);
    }

    #[tokio::test]
    async fn test_zero_limit_is_rejected() {
        let service = ShelvesService::new(Repository::in_memory());
        let mut shelf = fiction();
        shelf.max_borrow_per_student = Some(0);
        assert!(matches!(service.create(shelf).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_category_change_relabels_books() {
        let repository = Repository::in_memory();
        let service = ShelvesService::new(repository.clone());
        let shelf = service.create(fiction()).await.unwrap();

        let mut ids = Vec::new();
        for n in 1..=2 {
            let book = repository.books.create(&novel(n, shelf.id)).await.unwrap();
            ids.push(book.id);
        }

        service
            .update(
                shelf.id,
                UpdateShelf {
                    category: Some("Reference".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        for id in ids {
            let book = repository.books.get_by_id(id).await.unwrap();
            assert_eq!(book.category.as_deref(), Some("Reference"));
        }
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_books_unchanged() {
        let repository = Repository::in_memory();
        let service = ShelvesService::new(repository.clone());
        let shelf = service.create(fiction()).await.unwrap();
        service
            .create(CreateShelf {
                shelf_name: "Science".to_string(),
                shelf_code: "SC".to_string(),
                category: "Science".to_string(),
                max_borrow_per_student: None,
            })
            .await
            .unwrap();
        let book = repository.books.create(&novel(1, shelf.id)).await.unwrap();

        let result = service
            .update(
                shelf.id,
                UpdateShelf {
                    shelf_code: Some("SC".to_string()),
                    category: Some("Reference".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let unchanged = repository.shelves.get_by_id(shelf.id).await.unwrap();
        assert_eq!(unchanged.category, "Fiction");
        let book = repository.books.get_by_id(book.id).await.unwrap();
        assert_eq!(book.category.as_deref(), Some("Fiction"));
    }

    #[tokio::test]
    async fn test_update_failure_makes_no_other_write() {
        let mut shelves = MockShelfStore::new();
        shelves.expect_get_by_id().returning(|id| {
            Ok(Shelf {
                id,
                shelf_name: "Fiction A".to_string(),
                shelf_code: "FA".to_string(),
                category: "Fiction".to_string(),
                max_borrow_per_student: 1,
                shelf_count: 3,
            })
        });
        shelves
            .expect_update()
            .times(1)
            .returning(|_, _| Err(AppError::Internal("connection reset".to_string())));

        let mut repository = Repository::in_memory();
        repository.shelves = Arc::new(shelves);
        // No expectations: any separate book write would panic
        repository.books = Arc::new(MockBookStore::new());

        let result = ShelvesService::new(repository)
            .update(
                7,
                UpdateShelf {
                    category: Some("Reference".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
