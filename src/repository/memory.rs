//! In-memory store implementing every store trait
//!
//! Mirrors the PostgreSQL schema rules: unique keys, cascading deletes, the
//! protected room delete, nulled actor references and the one-active-borrow
//! rule. All tables sit behind one mutex so multi-step writes are atomic.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    conflict_message, missing_reference_message, search_term, BookStore, BorrowStore, GroupBy, RevisionPaperStore, RoomStore,
    ShelfLimit, ShelfStore, StatsStore, StudentStore, UserStore, UNASSIGNED_TEACHER,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, BookRecord},
        borrow::{Borrow, BorrowDetails, BorrowQuery, NewBorrow},
        revision_paper::{NewRevisionPaper, RevisionPaper, RevisionPaperQuery},
        room::{Room, RoomQuery, RoomRecord},
        shelf::{Shelf, ShelfQuery, ShelfRecord},
        stats::{BookBorrowCount, GroupStat, RoomStat, StudentBorrowCount, Totals},
        student::{Student, StudentQuery, StudentRecord},
        user::{NewUser, ProfileChanges, Role, User, UserQuery},
    },
};

/// One table with its id sequence
struct Table<T> {
    rows: BTreeMap<i32, T>,
    last_id: i32,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }
}

#[derive(Default)]
struct Tables {
    rooms: Table<Room>,
    shelves: Table<Shelf>,
    books: Table<Book>,
    students: Table<Student>,
    borrows: Table<Borrow>,
    revision_papers: Table<RevisionPaper>,
    users: Table<User>,
}

impl Tables {
    fn details(&self, borrow: &Borrow) -> Option<BorrowDetails> {
        let book = self.books.rows.get(&borrow.book_id)?;
        let student = self.students.rows.get(&borrow.student_id)?;
        let room = student.room_id.and_then(|id| self.rooms.rows.get(&id));

        Some(BorrowDetails {
            id: borrow.id,
            book_id: book.id,
            book_title: book.title.clone(),
            book_number: book.book_number.clone(),
            isbn: book.isbn.clone(),
            student_id: student.id,
            student_name: student.full_name(),
            admission_number: student.admission_number.clone(),
            room_form: room.map(|r| r.form.clone()),
            room_stream: room.map(|r| r.stream.clone()),
            borrowed_date: borrow.borrowed_date,
            due_date: borrow.due_date,
            returned: borrow.returned,
            returned_date: borrow.returned_date,
            processed_by: borrow.processed_by,
            is_overdue: false,
            days_overdue: 0,
        })
    }

    fn active_on_shelf(&self, student_id: i32, shelf_id: i32) -> i64 {
        self.borrows
            .values()
            .filter(|b| !b.returned && b.student_id == student_id)
            .filter(|b| {
                self.books
                    .rows
                    .get(&b.book_id)
                    .map_or(false, |book| book.shelf_id == Some(shelf_id))
            })
            .count() as i64
    }

    fn has_active(&self, book_id: i32) -> bool {
        self.borrows.values().any(|b| b.book_id == book_id && !b.returned)
    }

    fn remove_borrows_where(&mut self, pred: impl Fn(&Borrow) -> bool) {
        self.borrows.rows.retain(|_, b| !pred(b));
    }

    /// Students of each room and active borrows they hold
    fn room_activity(&self) -> BTreeMap<i32, (i64, i64)> {
        let mut activity: BTreeMap<i32, (i64, i64)> =
            self.rooms.rows.keys().map(|id| (*id, (0, 0))).collect();
        for student in self.students.values() {
            if let Some(entry) = student.room_id.and_then(|id| activity.get_mut(&id)) {
                entry.0 += 1;
                entry.1 += self
                    .borrows
                    .values()
                    .filter(|b| !b.returned && b.student_id == student.id)
                    .count() as i64;
            }
        }
        activity
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn conflict(constraint: &str) -> AppError {
    AppError::Conflict(conflict_message(constraint))
}

fn missing(kind: &str, id: i32) -> AppError {
    AppError::NotFound(format!("{} with id {} not found", kind, id))
}

/// In-memory implementation of the store traits
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn list(&self, query: &RoomQuery) -> AppResult<Vec<Room>> {
        let t = self.lock()?;
        let term = search_term(&query.search);
        let mut rooms: Vec<Room> = t
            .rooms
            .values()
            .filter(|r| {
                term.as_deref().map_or(true, |s| {
                    contains(&r.form, s)
                        || contains(&r.stream, s)
                        || contains(r.class_teacher.as_deref().unwrap_or(""), s)
                })
            })
            .filter(|r| query.form.as_deref().map_or(true, |f| eq_ignore_case(&r.form, f)))
            .cloned()
            .collect();
        rooms.sort_by(|a, b| (&a.form, &a.stream).cmp(&(&b.form, &b.stream)));
        Ok(rooms)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Room> {
        let t = self.lock()?;
        t.rooms.rows.get(&id).cloned().ok_or_else(|| missing("Room", id))
    }

    async fn create(&self, room: &RoomRecord) -> AppResult<Room> {
        let mut t = self.lock()?;
        if t.rooms.values().any(|r| r.form == room.form && r.stream == room.stream) {
            return Err(conflict("rooms_form_stream_unique"));
        }
        let id = t.rooms.next_id();
        let created = Room {
            id,
            form: room.form.clone(),
            stream: room.stream.clone(),
            class_teacher: room.class_teacher.clone(),
            total_students: 0,
        };
        t.rooms.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, room: &RoomRecord) -> AppResult<Room> {
        let mut t = self.lock()?;
        if t
            .rooms
            .values()
            .any(|r| r.id != id && r.form == room.form && r.stream == room.stream)
        {
            return Err(conflict("rooms_form_stream_unique"));
        }
        let existing = t.rooms.rows.get_mut(&id).ok_or_else(|| missing("Room", id))?;
        existing.form = room.form.clone();
        existing.stream = room.stream.clone();
        existing.class_teacher = room.class_teacher.clone();
        Ok(existing.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut t = self.lock()?;
        let students = t.students.values().filter(|s| s.room_id == Some(id)).count();
        if students > 0 {
            return Err(AppError::ProtectedDelete(format!(
                "Room {} still has {} student(s) assigned",
                id, students
            )));
        }
        t.rooms.rows.remove(&id).ok_or_else(|| missing("Room", id))?;
        for paper in t.revision_papers.rows.values_mut() {
            if paper.room_id == Some(id) {
                paper.room_id = None;
            }
        }
        Ok(())
    }

    async fn recount_students(&self, id: i32) -> AppResult<i32> {
        let mut t = self.lock()?;
        let count = t.students.values().filter(|s| s.room_id == Some(id)).count() as i32;
        let room = t.rooms.rows.get_mut(&id).ok_or_else(|| missing("Room", id))?;
        room.total_students = count;
        Ok(count)
    }
}

#[async_trait]
impl ShelfStore for MemoryStore {
    async fn list(&self, query: &ShelfQuery) -> AppResult<Vec<Shelf>> {
        let t = self.lock()?;
        let term = search_term(&query.search);
        let mut shelves: Vec<Shelf> = t
            .shelves
            .values()
            .filter(|s| {
                term.as_deref().map_or(true, |q| {
                    contains(&s.shelf_name, q) || contains(&s.shelf_code, q) || contains(&s.category, q)
                })
            })
            .filter(|s| {
                query
                    .category
                    .as_deref()
                    .map_or(true, |c| eq_ignore_case(&s.category, c))
            })
            .cloned()
            .collect();
        shelves.sort_by(|a, b| a.shelf_name.cmp(&b.shelf_name));
        Ok(shelves)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Shelf> {
        let t = self.lock()?;
        t.shelves.rows.get(&id).cloned().ok_or_else(|| missing("Shelf", id))
    }

    async fn create(&self, shelf: &ShelfRecord) -> AppResult<Shelf> {
        let mut t = self.lock()?;
        if shelf.max_borrow_per_student < 1 {
            return Err(AppError::Validation(
                "Value rejected by check shelves_max_borrow_per_student_check".to_string(),
            ));
        }
        if t.shelves.values().any(|s| s.shelf_name == shelf.shelf_name) {
            return Err(conflict("shelves_shelf_name_unique"));
        }
        if t.shelves.values().any(|s| s.shelf_code == shelf.shelf_code) {
            return Err(conflict("shelves_shelf_code_unique"));
        }
        let id = t.shelves.next_id();
        let created = Shelf {
            id,
            shelf_name: shelf.shelf_name.clone(),
            shelf_code: shelf.shelf_code.clone(),
            category: shelf.category.clone(),
            max_borrow_per_student: shelf.max_borrow_per_student,
            shelf_count: 0,
        };
        t.shelves.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, shelf: &ShelfRecord) -> AppResult<Shelf> {
        let mut t = self.lock()?;
        if shelf.max_borrow_per_student < 1 {
            return Err(AppError::Validation(
                "Value rejected by check shelves_max_borrow_per_student_check".to_string(),
            ));
        }
        if t.shelves.values().any(|s| s.id != id && s.shelf_name == shelf.shelf_name) {
            return Err(conflict("shelves_shelf_name_unique"));
        }
        if t.shelves.values().any(|s| s.id != id && s.shelf_code == shelf.shelf_code) {
            return Err(conflict("shelves_shelf_code_unique"));
        }
        let existing = t.shelves.rows.get_mut(&id).ok_or_else(|| missing("Shelf", id))?;
        existing.shelf_name = shelf.shelf_name.clone();
        existing.shelf_code = shelf.shelf_code.clone();
        existing.category = shelf.category.clone();
        existing.max_borrow_per_student = shelf.max_borrow_per_student;
        let updated = existing.clone();

        for book in t.books.rows.values_mut() {
            if book.shelf_id == Some(id) {
                book.category = Some(updated.category.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut t = self.lock()?;
        t.shelves.rows.remove(&id).ok_or_else(|| missing("Shelf", id))?;

        let book_ids: Vec<i32> = t
            .books
            .values()
            .filter(|b| b.shelf_id == Some(id))
            .map(|b| b.id)
            .collect();
        t.books.rows.retain(|_, b| b.shelf_id != Some(id));
        t.remove_borrows_where(|b| book_ids.contains(&b.book_id));
        for borrow in t.borrows.rows.values_mut() {
            if borrow.shelf_id == Some(id) {
                borrow.shelf_id = None;
            }
        }
        Ok(())
    }

    async fn recount_books(&self, id: i32) -> AppResult<i32> {
        let mut t = self.lock()?;
        let count = t.books.values().filter(|b| b.shelf_id == Some(id)).count() as i32;
        let shelf = t.shelves.rows.get_mut(&id).ok_or_else(|| missing("Shelf", id))?;
        shelf.shelf_count = count;
        Ok(count)
    }
}

impl Tables {
    fn check_book(&self, id: Option<i32>, book: &BookRecord) -> AppResult<()> {
        if book.first_publication < 0 {
            return Err(AppError::Validation(
                "Value rejected by check books_first_publication_check".to_string(),
            ));
        }
        if let Some(shelf_id) = book.shelf_id {
            if !self.shelves.rows.contains_key(&shelf_id) {
                return Err(missing("Shelf", shelf_id));
            }
        }
        let others = || self.books.values().filter(move |b| Some(b.id) != id);
        if others().any(|b| b.isbn == book.isbn) {
            return Err(conflict("books_isbn_unique"));
        }
        if others().any(|b| b.book_number == book.book_number) {
            return Err(conflict("books_book_number_unique"));
        }
        Ok(())
    }

    fn check_student(&self, id: Option<i32>, student: &StudentRecord) -> AppResult<()> {
        if let Some(room_id) = student.room_id {
            if !self.rooms.rows.contains_key(&room_id) {
                return Err(missing("Room", room_id));
            }
        }
        if self
            .students
            .values()
            .any(|s| Some(s.id) != id && s.admission_number == student.admission_number)
        {
            return Err(conflict("students_admission_number_unique"));
        }
        Ok(())
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let t = self.lock()?;
        let term = search_term(&query.search);
        let mut books: Vec<Book> = t
            .books
            .values()
            .filter(|b| {
                term.as_deref().map_or(true, |s| {
                    contains(&b.title, s)
                        || contains(&b.isbn, s)
                        || contains(&b.book_number, s)
                        || contains(&b.publishers, s)
                        || contains(b.category.as_deref().unwrap_or(""), s)
                })
            })
            .filter(|b| query.shelf_id.map_or(true, |id| b.shelf_id == Some(id)))
            .filter(|b| {
                query.category.as_deref().map_or(true, |c| {
                    b.category.as_deref().map_or(false, |bc| eq_ignore_case(bc, c))
                })
            })
            .filter(|b| query.available.map_or(true, |a| a == !t.has_active(b.id)))
            .cloned()
            .collect();
        books.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(books)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        let t = self.lock()?;
        t.books.rows.get(&id).cloned().ok_or_else(|| missing("Book", id))
    }

    async fn create(&self, book: &BookRecord) -> AppResult<Book> {
        let mut t = self.lock()?;
        t.check_book(None, book)?;
        let id = t.books.next_id();
        let created = Book {
            id,
            title: book.title.clone(),
            publishers: book.publishers.clone(),
            first_publication: book.first_publication,
            isbn: book.isbn.clone(),
            book_number: book.book_number.clone(),
            category: book.category.clone(),
            picture: book.picture.clone(),
            shelf_id: book.shelf_id,
            created_at: Utc::now(),
        };
        t.books.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, book: &BookRecord) -> AppResult<Book> {
        let mut t = self.lock()?;
        t.check_book(Some(id), book)?;
        let existing = t.books.rows.get_mut(&id).ok_or_else(|| missing("Book", id))?;
        existing.title = book.title.clone();
        existing.publishers = book.publishers.clone();
        existing.first_publication = book.first_publication;
        existing.isbn = book.isbn.clone();
        existing.book_number = book.book_number.clone();
        existing.category = book.category.clone();
        existing.picture = book.picture.clone();
        existing.shelf_id = book.shelf_id;
        Ok(existing.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut t = self.lock()?;
        t.books.rows.remove(&id).ok_or_else(|| missing("Book", id))?;
        t.remove_borrows_where(|b| b.book_id == id);
        Ok(())
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    async fn list(&self, query: &StudentQuery) -> AppResult<Vec<Student>> {
        let t = self.lock()?;
        let term = search_term(&query.search);
        let mut students: Vec<Student> = t
            .students
            .values()
            .filter(|s| {
                term.as_deref().map_or(true, |q| {
                    contains(&s.first_name, q)
                        || contains(&s.last_name, q)
                        || contains(&s.admission_number, q)
                        || contains(s.student_id.as_deref().unwrap_or(""), q)
                })
            })
            .filter(|s| query.room_id.map_or(true, |id| s.room_id == Some(id)))
            .cloned()
            .collect();
        // Rooms first, unassigned students last
        students.sort_by(|a, b| {
            (a.room_id.is_none(), a.room_id, &a.admission_number)
                .cmp(&(b.room_id.is_none(), b.room_id, &b.admission_number))
        });
        Ok(students)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Student> {
        let t = self.lock()?;
        t.students.rows.get(&id).cloned().ok_or_else(|| missing("Student", id))
    }

    async fn get_by_admission_number(&self, admission_number: &str) -> AppResult<Option<Student>> {
        let t = self.lock()?;
        let admission_number = admission_number.trim();
        let found = t
            .students
            .values()
            .find(|s| s.admission_number == admission_number)
            .cloned();
        Ok(found)
    }

    async fn create(&self, student: &StudentRecord) -> AppResult<Student> {
        let mut t = self.lock()?;
        t.check_student(None, student)?;
        let id = t.students.next_id();
        let created = Student {
            id,
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            admission_number: student.admission_number.clone(),
            student_id: student.student_id.clone(),
            year_of_study: student.year_of_study,
            current_class: student.current_class.clone(),
            picture: student.picture.clone(),
            room_id: student.room_id,
            created_at: Utc::now(),
        };
        t.students.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, student: &StudentRecord) -> AppResult<Student> {
        let mut t = self.lock()?;
        t.check_student(Some(id), student)?;
        let existing = t.students.rows.get_mut(&id).ok_or_else(|| missing("Student", id))?;
        existing.first_name = student.first_name.clone();
        existing.last_name = student.last_name.clone();
        existing.admission_number = student.admission_number.clone();
        if existing.student_id.is_none() {
            existing.student_id = student.student_id.clone();
        }
        existing.year_of_study = student.year_of_study;
        existing.current_class = student.current_class.clone();
        existing.picture = student.picture.clone();
        existing.room_id = student.room_id;
        Ok(existing.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut t = self.lock()?;
        t.students.rows.remove(&id).ok_or_else(|| missing("Student", id))?;
        t.remove_borrows_where(|b| b.student_id == id);
        Ok(())
    }
}

#[async_trait]
impl BorrowStore for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Borrow> {
        let t = self.lock()?;
        t.borrows.rows.get(&id).cloned().ok_or_else(|| missing("Borrow", id))
    }

    async fn list(&self, query: &BorrowQuery) -> AppResult<Vec<BorrowDetails>> {
        let t = self.lock()?;
        let now = Utc::now();
        let term = search_term(&query.search);

        let mut borrows: Vec<BorrowDetails> = t
            .borrows
            .values()
            .filter(|b| query.returned.map_or(true, |r| b.returned == r))
            .filter(|b| query.student_id.map_or(true, |id| b.student_id == id))
            .filter(|b| query.book_id.map_or(true, |id| b.book_id == id))
            .filter(|b| query.overdue.map_or(true, |o| o == (!b.returned && b.due_date < now)))
            .filter_map(|b| t.details(b))
            .filter(|d| {
                term.as_deref().map_or(true, |s| {
                    contains(&d.book_title, s)
                        || contains(&d.book_number, s)
                        || contains(&d.isbn, s)
                        || contains(&d.admission_number, s)
                        || contains(&d.student_name, s)
                })
            })
            .collect();

        match query.returned {
            Some(false) => borrows.sort_by(|a, b| (a.due_date, a.id).cmp(&(b.due_date, b.id))),
            Some(true) => borrows.sort_by(|a, b| (b.returned_date, b.id).cmp(&(a.returned_date, a.id))),
            None => borrows.sort_by(|a, b| (b.borrowed_date, b.id).cmp(&(a.borrowed_date, a.id))),
        }
        if let Some(limit) = query.limit {
            borrows.truncate(limit.max(0) as usize);
        }
        Ok(borrows)
    }

    async fn has_active_for_book(&self, book_id: i32) -> AppResult<bool> {
        let t = self.lock()?;
        Ok(t.has_active(book_id))
    }

    async fn count_active_for_student_on_shelf(&self, student_id: i32, shelf_id: i32) -> AppResult<i64> {
        let t = self.lock()?;
        Ok(t.active_on_shelf(student_id, shelf_id))
    }

    async fn create_active(&self, borrow: &NewBorrow, limit: Option<ShelfLimit>) -> AppResult<Borrow> {
        let mut t = self.lock()?;

        if !t.books.rows.contains_key(&borrow.book_id) || t.has_active(borrow.book_id) {
            return Err(AppError::BookUnavailable(borrow.book_id));
        }
        if !t.students.rows.contains_key(&borrow.student_id) {
            return Err(missing("Student", borrow.student_id));
        }
        t.check_actor(borrow.processed_by, "borrows_processed_by_fkey")?;
        if let Some(limit) = limit {
            let held = t.active_on_shelf(borrow.student_id, limit.shelf_id);
            if held >= limit.max_per_student as i64 {
                return Err(AppError::ShelfLimitExceeded {
                    shelf: limit.shelf_code,
                    held,
                    limit: limit.max_per_student,
                });
            }
        }

        let id = t.borrows.next_id();
        let created = Borrow {
            id,
            book_id: borrow.book_id,
            student_id: borrow.student_id,
            borrowed_date: borrow.borrowed_date,
            due_date: borrow.due_date,
            returned: false,
            returned_date: None,
            processed_by: borrow.processed_by,
            shelf_id: borrow.shelf_id,
        };
        t.borrows.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn mark_returned(&self, id: i32, at: DateTime<Utc>) -> AppResult<Borrow> {
        let mut t = self.lock()?;
        let borrow = t.borrows.rows.get_mut(&id).ok_or_else(|| missing("Borrow", id))?;
        if borrow.returned {
            return Err(AppError::AlreadyReturned(id));
        }
        borrow.returned = true;
        borrow.returned_date = Some(at);
        Ok(borrow.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut t = self.lock()?;
        t.borrows.rows.remove(&id).ok_or_else(|| missing("Borrow", id))?;
        Ok(())
    }
}

#[async_trait]
impl RevisionPaperStore for MemoryStore {
    async fn list(&self, query: &RevisionPaperQuery) -> AppResult<Vec<RevisionPaper>> {
        let t = self.lock()?;
        let term = search_term(&query.search);
        let mut papers: Vec<RevisionPaper> = t
            .revision_papers
            .values()
            .filter(|p| {
                term.as_deref()
                    .map_or(true, |s| contains(&p.title, s) || contains(&p.subject, s))
            })
            .filter(|p| query.room_id.map_or(true, |id| p.room_id == Some(id)))
            .filter(|p| {
                query
                    .subject
                    .as_deref()
                    .map_or(true, |s| eq_ignore_case(&p.subject, s))
            })
            .cloned()
            .collect();
        papers.sort_by(|a, b| (b.uploaded_at, b.id).cmp(&(a.uploaded_at, a.id)));
        Ok(papers)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<RevisionPaper> {
        let t = self.lock()?;
        t.revision_papers
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| missing("Revision paper", id))
    }

    async fn create(&self, paper: &NewRevisionPaper) -> AppResult<RevisionPaper> {
        let mut t = self.lock()?;
        if let Some(room_id) = paper.room_id {
            if !t.rooms.rows.contains_key(&room_id) {
                return Err(missing("Room", room_id));
            }
        }
        t.check_actor(paper.uploaded_by, "revision_papers_uploaded_by_fkey")?;
        let id = t.revision_papers.next_id();
        let created = RevisionPaper {
            id,
            title: paper.title.clone(),
            subject: paper.subject.clone(),
            file: paper.file.clone(),
            room_id: paper.room_id,
            uploaded_by: paper.uploaded_by,
            uploaded_at: paper.uploaded_at,
        };
        t.revision_papers.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut t = self.lock()?;
        t.revision_papers
            .rows
            .remove(&id)
            .ok_or_else(|| missing("Revision paper", id))?;
        Ok(())
    }
}

impl Tables {
    fn check_user_email(&self, id: Option<i32>, email: Option<&str>) -> AppResult<()> {
        if let Some(email) = email {
            if self.users.values().any(|u| {
                Some(u.id) != id && u.email.as_deref().map_or(false, |e| eq_ignore_case(e, email))
            }) {
                return Err(conflict("users_email_unique"));
            }
        }
        Ok(())
    }

    /// Same outcome as the foreign key on `processed_by` / `uploaded_by`
    fn check_actor(&self, user_id: Option<i32>, constraint: &str) -> AppResult<()> {
        match user_id {
            Some(id) if !self.users.rows.contains_key(&id) => {
                Err(AppError::NotFound(missing_reference_message(constraint)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list(&self, query: &UserQuery) -> AppResult<Vec<User>> {
        let t = self.lock()?;
        let term = search_term(&query.search);
        let mut users: Vec<User> = t
            .users
            .values()
            .filter(|u| {
                term.as_deref().map_or(true, |s| {
                    contains(&u.username, s)
                        || contains(&u.first_name, s)
                        || contains(&u.last_name, s)
                        || contains(u.email.as_deref().unwrap_or(""), s)
                        || contains(u.admission_number.as_deref().unwrap_or(""), s)
                        || contains(u.phone.as_deref().unwrap_or(""), s)
                })
            })
            .filter(|u| query.role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            (&a.last_name, &a.first_name, &a.username).cmp(&(&b.last_name, &b.first_name, &b.username))
        });
        Ok(users)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<User> {
        let t = self.lock()?;
        t.users.rows.get(&id).cloned().ok_or_else(|| missing("User", id))
    }

    async fn find_by_login(&self, identifier: &str) -> AppResult<Option<User>> {
        let t = self.lock()?;
        let identifier = identifier.trim();
        let by_username = t.users.values().find(|u| eq_ignore_case(&u.username, identifier));
        let user = by_username.or_else(|| {
            t.users.values().find(|u| {
                u.email.as_deref().map_or(false, |e| eq_ignore_case(e, identifier))
                    || u.phone.as_deref() == Some(identifier)
            })
        });
        Ok(user.cloned())
    }

    async fn find_student(&self, admission_number: &str) -> AppResult<Option<User>> {
        let t = self.lock()?;
        let found = t
            .users
            .values()
            .find(|u| u.role == Role::Student && u.admission_number.as_deref() == Some(admission_number.trim()))
            .cloned();
        Ok(found)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let t = self.lock()?;
        let found = t
            .users
            .values()
            .find(|u| u.email.as_deref().map_or(false, |e| eq_ignore_case(e, email.trim())))
            .cloned();
        Ok(found)
    }

    async fn create(&self, user: &NewUser) -> AppResult<User> {
        let mut t = self.lock()?;
        if t.users.values().any(|u| u.username == user.username) {
            return Err(conflict("users_username_key"));
        }
        t.check_user_email(None, user.email.as_deref())?;
        let id = t.users.next_id();
        let created = User {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            admission_number: user.admission_number.clone(),
            phone: user.phone.clone(),
            created_at: Utc::now(),
        };
        t.users.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn update_profile(&self, id: i32, changes: &ProfileChanges) -> AppResult<User> {
        let mut t = self.lock()?;
        t.check_user_email(Some(id), changes.email.as_deref())?;
        let user = t.users.rows.get_mut(&id).ok_or_else(|| missing("User", id))?;
        if let Some(first_name) = &changes.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &changes.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(email) = &changes.email {
            user.email = Some(email.clone());
        }
        if let Some(phone) = &changes.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(password) = &changes.password {
            user.password = Some(password.clone());
        }
        Ok(user.clone())
    }

    async fn set_role(&self, id: i32, role: Role) -> AppResult<User> {
        let mut t = self.lock()?;
        let user = t.users.rows.get_mut(&id).ok_or_else(|| missing("User", id))?;
        user.role = role;
        Ok(user.clone())
    }

    async fn set_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        let mut t = self.lock()?;
        let user = t.users.rows.get_mut(&id).ok_or_else(|| missing("User", id))?;
        user.password = Some(password_hash.to_string());
        Ok(())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut t = self.lock()?;
        t.users.rows.remove(&id).ok_or_else(|| missing("User", id))?;
        for borrow in t.borrows.rows.values_mut() {
            if borrow.processed_by == Some(id) {
                borrow.processed_by = None;
            }
        }
        for paper in t.revision_papers.rows.values_mut() {
            if paper.uploaded_by == Some(id) {
                paper.uploaded_by = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn totals(&self, now: DateTime<Utc>) -> AppResult<Totals> {
        let t = self.lock()?;
        Ok(Totals {
            total_books: t.books.rows.len() as i64,
            total_students: t.students.rows.len() as i64,
            total_rooms: t.rooms.rows.len() as i64,
            total_shelves: t.shelves.rows.len() as i64,
            active_borrows: t.borrows.values().filter(|b| !b.returned).count() as i64,
            overdue_borrows: t
                .borrows
                .values()
                .filter(|b| !b.returned && b.due_date < now)
                .count() as i64,
        })
    }

    async fn room_stats(&self, form: Option<String>) -> AppResult<Vec<RoomStat>> {
        let t = self.lock()?;
        let activity = t.room_activity();
        let mut stats: Vec<RoomStat> = t
            .rooms
            .values()
            .filter(|r| form.as_deref().map_or(true, |f| eq_ignore_case(&r.form, f)))
            .map(|r| {
                let (students, active_borrows) = activity.get(&r.id).copied().unwrap_or_default();
                RoomStat {
                    room_id: r.id,
                    form: r.form.clone(),
                    stream: r.stream.clone(),
                    class_teacher: r.class_teacher.clone(),
                    students,
                    active_borrows,
                }
            })
            .collect();
        stats.sort_by(|a, b| (&a.form, &a.stream).cmp(&(&b.form, &b.stream)));
        Ok(stats)
    }

    async fn group_stats(&self, group_by: GroupBy) -> AppResult<Vec<GroupStat>> {
        let t = self.lock()?;
        let activity = t.room_activity();
        let mut groups: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for room in t.rooms.values() {
            let label = match group_by {
                GroupBy::Form => room.form.clone(),
                GroupBy::Stream => room.stream.clone(),
                GroupBy::Teacher => room
                    .class_teacher
                    .clone()
                    .unwrap_or_else(|| UNASSIGNED_TEACHER.to_string()),
            };
            let (students, borrows) = activity.get(&room.id).copied().unwrap_or_default();
            let entry = groups.entry(label).or_default();
            entry.0 += students;
            entry.1 += borrows;
        }
        Ok(groups
            .into_iter()
            .map(|(label, (students, active_borrows))| GroupStat {
                label,
                students,
                active_borrows,
            })
            .collect())
    }

    async fn most_borrowed_books(&self, limit: i64) -> AppResult<Vec<BookBorrowCount>> {
        let t = self.lock()?;
        let mut counts: Vec<BookBorrowCount> = t
            .books
            .values()
            .map(|b| BookBorrowCount {
                book_id: b.id,
                title: b.title.clone(),
                book_number: b.book_number.clone(),
                borrow_count: t.borrows.values().filter(|br| br.book_id == b.id).count() as i64,
            })
            .filter(|c| c.borrow_count > 0)
            .collect();
        counts.sort_by(|a, b| b.borrow_count.cmp(&a.borrow_count).then_with(|| a.title.cmp(&b.title)));
        counts.truncate(limit.max(0) as usize);
        Ok(counts)
    }

    async fn most_active_students(&self, limit: i64) -> AppResult<Vec<StudentBorrowCount>> {
        let t = self.lock()?;
        let mut counts: Vec<StudentBorrowCount> = t
            .students
            .values()
            .map(|s| StudentBorrowCount {
                student_id: s.id,
                first_name: s.first_name.clone(),
                last_name: s.last_name.clone(),
                admission_number: s.admission_number.clone(),
                borrow_count: t.borrows.values().filter(|b| b.student_id == s.id).count() as i64,
            })
            .filter(|c| c.borrow_count > 0)
            .collect();
        counts.sort_by(|a, b| {
            b.borrow_count
                .cmp(&a.borrow_count)
                .then_with(|| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)))
        });
        counts.truncate(limit.max(0) as usize);
        Ok(counts)
    }

    async fn due_between(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> AppResult<Vec<BorrowDetails>> {
        let t = self.lock()?;
        let mut due: Vec<BorrowDetails> = t
            .borrows
            .values()
            .filter(|b| !b.returned && b.due_date >= from && b.due_date <= until)
            .filter_map(|b| t.details(b))
            .collect();
        due.sort_by(|a, b| (a.due_date, a.id).cmp(&(b.due_date, b.id)));
        Ok(due)
    }

    async fn room_borrow_counts(&self, room_id: i32, now: DateTime<Utc>) -> AppResult<(i64, i64)> {
        let t = self.lock()?;
        let active: Vec<&Borrow> = t
            .borrows
            .values()
            .filter(|b| !b.returned)
            .filter(|b| {
                t.students
                    .rows
                    .get(&b.student_id)
                    .map_or(false, |s| s.room_id == Some(room_id))
            })
            .collect();
        let overdue = active.iter().filter(|b| b.due_date < now).count() as i64;
        Ok((active.len() as i64, overdue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn room() -> RoomRecord {
        RoomRecord {
            form: "Form 2".to_string(),
            stream: "East".to_string(),
            class_teacher: None,
        }
    }

    fn shelf(code: &str) -> ShelfRecord {
        ShelfRecord {
            shelf_name: format!("Shelf {}", code),
            shelf_code: code.to_string(),
            category: "Fiction".to_string(),
            max_borrow_per_student: 1,
        }
    }

    fn book(number: &str, shelf_id: Option<i32>) -> BookRecord {
        BookRecord {
            title: format!("Book {}", number),
            publishers: "Longhorn".to_string(),
            first_publication: 1999,
            isbn: format!("isbn-{}", number),
            book_number: number.to_string(),
            category: None,
            picture: None,
            shelf_id,
        }
    }

    fn student(admission: &str, room_id: Option<i32>) -> StudentRecord {
        StudentRecord {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            admission_number: admission.to_string(),
            student_id: None,
            year_of_study: 2,
            current_class: "2E".to_string(),
            picture: None,
            room_id,
        }
    }

    fn new_borrow(book_id: i32, student_id: i32, shelf_id: Option<i32>) -> NewBorrow {
        let now = Utc::now();
        NewBorrow {
            book_id,
            student_id,
            borrowed_date: now,
            due_date: now + Duration::days(14),
            processed_by: None,
            shelf_id,
        }
    }

    #[tokio::test]
    async fn test_unique_keys_are_enforced() {
        let store = MemoryStore::new();
        BookStore::create(&store, &book("B1", None)).await.unwrap();

        let mut duplicate = book("B2", None);
        duplicate.isbn = "isbn-B1".to_string();
        match BookStore::create(&store, &duplicate).await {
            Err(AppError::Conflict(msg)) => assert!(msg.contains("ISBN")),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shelf_delete_cascades_to_books_and_borrows() {
        let store = MemoryStore::new();
        let s = ShelfStore::create(&store, &shelf("F1")).await.unwrap();
        let b = BookStore::create(&store, &book("B1", Some(s.id))).await.unwrap();
        let st = StudentStore::create(&store, &student("1001", None)).await.unwrap();
        let br = store.create_active(&new_borrow(b.id, st.id, Some(s.id)), None).await.unwrap();

        ShelfStore::delete(&store, s.id).await.unwrap();

        assert!(BookStore::get_by_id(&store, b.id).await.is_err());
        assert!(BorrowStore::get_by_id(&store, br.id).await.is_err());
        assert!(StudentStore::get_by_id(&store, st.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_room_delete_is_protected() {
        let store = MemoryStore::new();
        let r = RoomStore::create(&store, &room()).await.unwrap();
        let st = StudentStore::create(&store, &student("1001", Some(r.id))).await.unwrap();

        let err = RoomStore::delete(&store, r.id).await.unwrap_err();
        assert!(matches!(err, AppError::ProtectedDelete(_)));

        StudentStore::delete(&store, st.id).await.unwrap();
        RoomStore::delete(&store, r.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_active_rejects_second_active_borrow() {
        let store = MemoryStore::new();
        let b = BookStore::create(&store, &book("B1", None)).await.unwrap();
        let s1 = StudentStore::create(&store, &student("1001", None)).await.unwrap();
        let s2 = StudentStore::create(&store, &student("1002", None)).await.unwrap();

        store.create_active(&new_borrow(b.id, s1.id, None), None).await.unwrap();
        let err = store
            .create_active(&new_borrow(b.id, s2.id, None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookUnavailable(id) if id == b.id));
    }

    #[tokio::test]
    async fn test_mark_returned_twice() {
        let store = MemoryStore::new();
        let b = BookStore::create(&store, &book("B1", None)).await.unwrap();
        let st = StudentStore::create(&store, &student("1001", None)).await.unwrap();
        let br = store.create_active(&new_borrow(b.id, st.id, None), None).await.unwrap();

        let returned = store.mark_returned(br.id, Utc::now()).await.unwrap();
        assert!(returned.returned);
        assert!(returned.returned_date.is_some());

        let err = store.mark_returned(br.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyReturned(_)));
        assert!(matches!(
            store.mark_returned(999, Utc::now()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_user_delete_nulls_processed_by() {
        let store = MemoryStore::new();
        let staff = UserStore::create(
            &store,
            &NewUser {
                username: "desk".to_string(),
                email: None,
                password: None,
                first_name: "Desk".to_string(),
                last_name: "Staff".to_string(),
                role: Role::Staff,
                admission_number: None,
                phone: None,
            },
        )
        .await
        .unwrap();
        let b = BookStore::create(&store, &book("B1", None)).await.unwrap();
        let st = StudentStore::create(&store, &student("1001", None)).await.unwrap();
        let mut request = new_borrow(b.id, st.id, None);
        request.processed_by = Some(staff.id);
        let br = store.create_active(&request, None).await.unwrap();

        UserStore::delete(&store, staff.id).await.unwrap();

        let kept = BorrowStore::get_by_id(&store, br.id).await.unwrap();
        assert_eq!(kept.processed_by, None);
    }
}
