//! Book catalog service

use validator::Validate;

use super::{counters::CounterService, required, required_change};
use crate::{
    error::AppResult,
    models::book::{Book, BookQuery, BookRecord, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
    counters: CounterService,
}

impl BooksService {
    pub fn new(repository: Repository, counters: CounterService) -> Self {
        Self { repository, counters }
    }

    pub async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.repository.books.list(query).await
    }

    /// Books without an active borrow
    pub async fn available(&self, search: Option<String>) -> AppResult<Vec<Book>> {
        self.repository
            .books
            .list(&BookQuery {
                search,
                available: Some(true),
                ..Default::default()
            })
            .await
    }

    pub async fn get(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Category of the shelf a book is placed on, `None` off-shelf
    async fn shelf_category(&self, shelf_id: Option<i32>) -> AppResult<Option<String>> {
        match shelf_id {
            Some(id) => Ok(Some(self.repository.shelves.get_by_id(id).await?.category)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        let title = required("Title", &book.title)?;
        let publishers = required("Publishers", &book.publishers)?;
        let isbn = required("ISBN", &book.isbn)?;
        let book_number = required("Book number", &book.book_number)?;
        let category = self.shelf_category(book.shelf_id).await?;

        let created = self
            .repository
            .books
            .create(&BookRecord {
                title,
                publishers,
                first_publication: book.first_publication,
                isbn,
                book_number,
                category,
                picture: book.picture,
                shelf_id: book.shelf_id,
            })
            .await?;

        self.counters.refresh_shelves(&[created.shelf_id]).await;
        tracing::info!(book_id = created.id, "Book {} added", created.book_number);
        Ok(created)
    }

    /// Moving a book refreshes both the old and the new shelf
    pub async fn update(&self, id: i32, changes: UpdateBook) -> AppResult<Book> {
        changes.validate()?;
        let current = self.repository.books.get_by_id(id).await?;
        let shelf_id = changes.shelf_id.unwrap_or(current.shelf_id);
        let category = self.shelf_category(shelf_id).await?;

        let record = BookRecord {
            title: required_change("Title", changes.title)?.unwrap_or(current.title),
            publishers: required_change("Publishers", changes.publishers)?
                .unwrap_or(current.publishers),
            first_publication: changes.first_publication.unwrap_or(current.first_publication),
            isbn: required_change("ISBN", changes.isbn)?.unwrap_or(current.isbn),
            book_number: required_change("Book number", changes.book_number)?
                .unwrap_or(current.book_number),
            category,
            picture: changes.picture.unwrap_or(current.picture),
            shelf_id,
        };

        let updated = self.repository.books.update(id, &record).await?;
        self.counters
            .refresh_shelves(&[current.shelf_id, updated.shelf_id])
            .await;
        Ok(updated)
    }

    /// Deletes the book with its borrows
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let book = self.repository.books.get_by_id(id).await?;
        self.repository.books.delete(id).await?;
        self.counters.refresh_shelves(&[book.shelf_id]).await;
        tracing::info!(book_id = id, "Book {} deleted", book.book_number);
        Ok(())
    }
}
