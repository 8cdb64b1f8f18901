//! Dashboards and analysis reports

use chrono::{Duration, Utc};

use crate::{
    config::LibraryConfig,
    error::{AppError, AppResult},
    models::{
        borrow::{BorrowDetails, BorrowQuery},
        revision_paper::RevisionPaperQuery,
        stats::{Analysis, Dashboard, FormRooms, RoomDashboard, StudentDashboard},
        student::StudentQuery,
    },
    repository::{GroupBy, Repository},
};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
    config: LibraryConfig,
}

impl StatsService {
    pub fn new(repository: Repository, config: LibraryConfig) -> Self {
        Self { repository, config }
    }

    /// Active borrows due between now and the configured window
    async fn due_soon(&self) -> AppResult<Vec<BorrowDetails>> {
        let now = Utc::now();
        let until = now + Duration::days(self.config.due_soon_days.max(0));
        let due = self.repository.stats.due_between(now, until).await?;
        Ok(due.into_iter().map(|b| b.with_overdue(now)).collect())
    }

    /// Cheap store round trip for the readiness probe
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.stats.totals(Utc::now()).await.map(|_| ())
    }

    pub async fn dashboard(&self) -> AppResult<Dashboard> {
        Ok(Dashboard {
            totals: self.repository.stats.totals(Utc::now()).await?,
            due_soon: self.due_soon().await?,
        })
    }

    pub async fn analysis(&self) -> AppResult<Analysis> {
        let stats = &self.repository.stats;
        Ok(Analysis {
            totals: stats.totals(Utc::now()).await?,
            per_room: stats.room_stats(None).await?,
            per_form: stats.group_stats(GroupBy::Form).await?,
            per_stream: stats.group_stats(GroupBy::Stream).await?,
            per_teacher: stats.group_stats(GroupBy::Teacher).await?,
            most_borrowed_books: stats.most_borrowed_books(self.config.top_n).await?,
            most_active_students: stats.most_active_students(self.config.top_n).await?,
            due_soon: self.due_soon().await?,
        })
    }

    pub async fn room_dashboard(&self, room_id: i32) -> AppResult<RoomDashboard> {
        let room = self.repository.rooms.get_by_id(room_id).await?;
        let students = self
            .repository
            .students
            .list(&StudentQuery {
                room_id: Some(room_id),
                ..Default::default()
            })
            .await?;
        let (active_borrows, overdue_borrows) = self
            .repository
            .stats
            .room_borrow_counts(room_id, Utc::now())
            .await?;

        Ok(RoomDashboard {
            room,
            students,
            active_borrows,
            overdue_borrows,
        })
    }

    pub async fn form_rooms(&self, form: &str) -> AppResult<FormRooms> {
        let rooms = self.repository.stats.room_stats(Some(form.to_string())).await?;
        if rooms.is_empty() {
            return Err(AppError::NotFound(format!("No rooms in form {}", form)));
        }
        Ok(FormRooms {
            form: form.to_string(),
            students: rooms.iter().map(|r| r.students).sum(),
            active_borrows: rooms.iter().map(|r| r.active_borrows).sum(),
            rooms,
        })
    }

    /// What the student holding `admission_number` sees after logging in
    pub async fn student_dashboard(&self, admission_number: &str) -> AppResult<StudentDashboard> {
        let student = self
            .repository
            .students
            .get_by_admission_number(admission_number)
            .await?
            .ok_or_else(|| AppError::UnknownStudent(admission_number.to_string()))?;

        let room = match student.room_id {
            Some(id) => Some(self.repository.rooms.get_by_id(id).await?),
            None => None,
        };

        let now = Utc::now();
        let borrows: Vec<BorrowDetails> = self
            .repository
            .borrows
            .list(&BorrowQuery {
                student_id: Some(student.id),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|b| b.with_overdue(now))
            .collect();
        let (active_borrows, history): (Vec<_>, Vec<_>) =
            borrows.into_iter().partition(|b| !b.returned);

        let revision_papers = match student.room_id {
            Some(room_id) => {
                self.repository
                    .revision_papers
                    .list(&RevisionPaperQuery {
                        room_id: Some(room_id),
                        ..Default::default()
                    })
                    .await?
            }
            None => Vec::new(),
        };

        Ok(StudentDashboard {
            student,
            room,
            active_borrows,
            history,
            revision_papers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            book::BookRecord, borrow::NewBorrow, room::RoomRecord, student::StudentRecord,
        },
        repository::UNASSIGNED_TEACHER,
    };

    struct Fixture {
        repository: Repository,
        stats: StatsService,
        rooms: Vec<i32>,
        students: Vec<i32>,
        books: Vec<i32>,
    }

    async fn fixture() -> Fixture {
        let repository = Repository::in_memory();
        let mut rooms = Vec::new();
        for (form, stream, teacher) in [
            ("Form 1", "East", Some("Mr. Kip")),
            ("Form 1", "West", None),
            ("Form 2", "East", Some("Mr. Kip")),
        ] {
            let room = repository
                .rooms
                .create(&RoomRecord {
                    form: form.to_string(),
                    stream: stream.to_string(),
                    class_teacher: teacher.map(str::to_string),
                })
                .await
                .unwrap();
            rooms.push(room.id);
        }

        let mut students = Vec::new();
        for (n, room_id) in [rooms[0], rooms[0], rooms[1], rooms[2]].iter().enumerate() {
            let s = repository
                .students
                .create(&StudentRecord {
                    first_name: format!("Student{}", n),
                    last_name: "Test".to_string(),
                    admission_number: format!("A{}", n),
                    student_id: None,
                    year_of_study: 1,
                    current_class: "1".to_string(),
                    picture: None,
                    room_id: Some(*room_id),
                })
                .await
                .unwrap();
            students.push(s.id);
        }

        let mut books = Vec::new();
        for n in 0..3 {
            let b = repository
                .books
                .create(&BookRecord {
                    title: format!("Book {}", n),
                    publishers: "KLB".to_string(),
                    first_publication: 2000,
                    isbn: format!("i{}", n),
                    book_number: format!("b{}", n),
                    category: None,
                    picture: None,
                    shelf_id: None,
                })
                .await
                .unwrap();
            books.push(b.id);
        }

        Fixture {
            stats: StatsService::new(repository.clone(), LibraryConfig::default()),
            repository,
            rooms,
            students,
            books,
        }
    }

    async fn lend(repository: &Repository, book_id: i32, student_id: i32, due_in_days: i64) -> i32 {
        let now = Utc::now();
        repository
            .borrows
            .create_active(
                &NewBorrow {
                    book_id,
                    student_id,
                    borrowed_date: now - Duration::days(20),
                    due_date: now + Duration::days(due_in_days),
                    processed_by: None,
                    shelf_id: None,
                },
                None,
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_dashboard_totals_and_due_soon() {
        let f = fixture().await;
        lend(&f.repository, f.books[0], f.students[0], 3).await;
        lend(&f.repository, f.books[1], f.students[1], -2).await;
        lend(&f.repository, f.books[2], f.students[2], 30).await;

        let dashboard = f.stats.dashboard().await.unwrap();
        assert_eq!(dashboard.totals.total_books, 3);
        assert_eq!(dashboard.totals.total_students, 4);
        assert_eq!(dashboard.totals.total_rooms, 3);
        assert_eq!(dashboard.totals.active_borrows, 3);
        assert_eq!(dashboard.totals.overdue_borrows, 1);
        // Overdue and far-off borrows are outside the window
        assert_eq!(dashboard.due_soon.len(), 1);
        assert_eq!(dashboard.due_soon[0].book_id, f.books[0]);
    }

    #[tokio::test]
    async fn test_analysis_groups() {
        let f = fixture().await;
        let first = lend(&f.repository, f.books[0], f.students[0], 5).await;
        f.repository.borrows.mark_returned(first, Utc::now()).await.unwrap();
        lend(&f.repository, f.books[0], f.students[0], 5).await;
        lend(&f.repository, f.books[1], f.students[3], 5).await;

        let analysis = f.stats.analysis().await.unwrap();

        let form1 = analysis.per_form.iter().find(|g| g.label == "Form 1").unwrap();
        assert_eq!(form1.students, 3);
        assert_eq!(form1.active_borrows, 1);

        let east = analysis.per_stream.iter().find(|g| g.label == "East").unwrap();
        assert_eq!(east.students, 3);
        assert_eq!(east.active_borrows, 2);

        let unassigned = analysis
            .per_teacher
            .iter()
            .find(|g| g.label == UNASSIGNED_TEACHER)
            .unwrap();
        assert_eq!(unassigned.students, 1);

        assert_eq!(analysis.most_borrowed_books[0].book_id, f.books[0]);
        assert_eq!(analysis.most_borrowed_books[0].borrow_count, 2);
        assert_eq!(analysis.most_borrowed_books.len(), 2);
        assert_eq!(analysis.most_active_students[0].student_id, f.students[0]);
        assert!(analysis.most_active_students.iter().all(|s| s.borrow_count > 0));
        assert_eq!(analysis.per_room.len(), 3);
    }

    #[tokio::test]
    async fn test_room_and_form_views() {
        let f = fixture().await;
        lend(&f.repository, f.books[0], f.students[0], -1).await;
        lend(&f.repository, f.books[1], f.students[1], 4).await;

        let room = f.stats.room_dashboard(f.rooms[0]).await.unwrap();
        assert_eq!(room.students.len(), 2);
        assert_eq!(room.active_borrows, 2);
        assert_eq!(room.overdue_borrows, 1);

        let form = f.stats.form_rooms("form 1").await.unwrap();
        assert_eq!(form.rooms.len(), 2);
        assert_eq!(form.students, 3);
        assert_eq!(form.active_borrows, 2);

        assert!(matches!(f.stats.form_rooms("Form 9").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_student_dashboard_splits_history() {
        let f = fixture().await;
        let old = lend(&f.repository, f.books[0], f.students[0], 5).await;
        f.repository.borrows.mark_returned(old, Utc::now()).await.unwrap();
        lend(&f.repository, f.books[1], f.students[0], -4).await;

        let view = f.stats.student_dashboard("A0").await.unwrap();
        assert_eq!(view.active_borrows.len(), 1);
        assert!(view.active_borrows[0].is_overdue);
        assert_eq!(view.history.len(), 1);
        assert_eq!(view.room.map(|r| r.id), Some(f.rooms[0]));

        assert!(matches!(
            f.stats.student_dashboard("missing").await,
            Err(AppError::UnknownStudent(_))
        ));
    }
}
