//! Student registry service

use chrono::Utc;
use validator::Validate;

use super::{counters::CounterService, required, required_change};
use crate::{
    error::AppResult,
    models::student::{
        generate_student_id, CreateStudent, Student, StudentQuery, StudentRecord, UpdateStudent,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct StudentsService {
    repository: Repository,
    counters: CounterService,
}

impl StudentsService {
    pub fn new(repository: Repository, counters: CounterService) -> Self {
        Self { repository, counters }
    }

    pub async fn list(&self, query: &StudentQuery) -> AppResult<Vec<Student>> {
        self.repository.students.list(query).await
    }

    pub async fn get(&self, id: i32) -> AppResult<Student> {
        self.repository.students.get_by_id(id).await
    }

    async fn check_room(&self, room_id: Option<i32>) -> AppResult<()> {
        if let Some(id) = room_id {
            self.repository.rooms.get_by_id(id).await?;
        }
        Ok(())
    }

    pub async fn create(&self, student: CreateStudent) -> AppResult<Student> {
        student.validate()?;
        let first_name = required("First name", &student.first_name)?;
        let last_name = required("Last name", &student.last_name)?;
        let admission_number = required("Admission number", &student.admission_number)?;
        let current_class = required("Current class", &student.current_class)?;
        self.check_room(student.room_id).await?;

        let student_id = generate_student_id(&first_name, &last_name, &admission_number, Utc::now());

        let created = self
            .repository
            .students
            .create(&StudentRecord {
                first_name,
                last_name,
                admission_number,
                student_id: Some(student_id),
                year_of_study: student.year_of_study,
                current_class,
                picture: student.picture,
                room_id: student.room_id,
            })
            .await?;

        self.counters.refresh_rooms(&[created.room_id]).await;
        tracing::info!(student_id = created.id, "Student {} enrolled", created.admission_number);
        Ok(created)
    }

    /// The generated student id is kept as is; moving rooms refreshes both rooms
    pub async fn update(&self, id: i32, changes: UpdateStudent) -> AppResult<Student> {
        changes.validate()?;
        let first_name = required_change("First name", changes.first_name)?;
        let last_name = required_change("Last name", changes.last_name)?;
        let admission_number = required_change("Admission number", changes.admission_number)?;
        let current_class = required_change("Current class", changes.current_class)?;

        let current = self.repository.students.get_by_id(id).await?;
        let room_id = changes.room_id.unwrap_or(current.room_id);
        self.check_room(room_id).await?;

        let first_name = first_name.unwrap_or(current.first_name);
        let last_name = last_name.unwrap_or(current.last_name);
        let admission_number = admission_number.unwrap_or(current.admission_number);
        // Records created before ids were generated get one on their first edit
        let student_id = current.student_id.or_else(|| {
            Some(generate_student_id(
                &first_name,
                &last_name,
                &admission_number,
                current.created_at,
            ))
        });

        let record = StudentRecord {
            first_name,
            last_name,
            admission_number,
            student_id,
            year_of_study: changes.year_of_study.unwrap_or(current.year_of_study),
            current_class: current_class.unwrap_or(current.current_class),
            picture: changes.picture.unwrap_or(current.picture),
            room_id,
        };

        let updated = self.repository.students.update(id, &record).await?;
        self.counters
            .refresh_rooms(&[current.room_id, updated.room_id])
            .await;
        Ok(updated)
    }

    /// Deletes the student with their borrows
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let student = self.repository.students.get_by_id(id).await?;
        self.repository.students.delete(id).await?;
        self.counters.refresh_rooms(&[student.room_id]).await;
        tracing::info!(student_id = id, "Student {} removed", student.admission_number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppError,
        models::room::RoomRecord,
    };

    async fn room(repository: &Repository, stream: &str) -> i32 {
        repository
            .rooms
            .create(&RoomRecord {
                form: "Form 2".to_string(),
                stream: stream.to_string(),
                class_teacher: Some("Mr. Kamau".to_string()),
            })
            .await
            .unwrap()
            .id
    }

    fn enrol(first: &str, admission: &str, room_id: Option<i32>) -> CreateStudent {
        CreateStudent {
            first_name: first.to_string(),
            last_name: "Mwangi".to_string(),
            admission_number: admission.to_string(),
            year_of_study: 2,
            current_class: "2E".to_string(),
            picture: None,
            room_id,
        }
    }

    fn service(repository: &Repository) -> StudentsService {
        StudentsService::new(repository.clone(), CounterService::new(repository.clone()))
    }

    async fn total(repository: &Repository, room_id: i32) -> i32 {
        repository.rooms.get_by_id(room_id).await.unwrap().total_students
    }

    #[tokio::test]
    async fn test_room_count_and_protected_delete() {
        let repository = Repository::in_memory();
        let east = room(&repository, "East").await;
        let students = service(&repository);

        let mut ids = Vec::new();
        for (i, name) in ["Achieng", "Baraka", "Chebet"].iter().enumerate() {
            let s = students
                .create(enrol(name, &format!("30{}", i), Some(east)))
                .await
                .unwrap();
            ids.push(s.id);
        }
        assert_eq!(total(&repository, east).await, 3);

        students.delete(ids[0]).await.unwrap();
        assert_eq!(total(&repository, east).await, 2);

        let err = repository.rooms.delete(east).await.unwrap_err();
        assert!(matches!(err, AppError::ProtectedDelete(_)));
        assert_eq!(total(&repository, east).await, 2);
    }

    #[tokio::test]
    async fn test_move_between_rooms_updates_both() {
        let repository = Repository::in_memory();
        let east = room(&repository, "East").await;
        let west = room(&repository, "West").await;
        let students = service(&repository);

        let s = students.create(enrol("Daudi", "401", Some(east))).await.unwrap();
        students
            .update(
                s.id,
                UpdateStudent {
                    room_id: Some(Some(west)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(total(&repository, east).await, 0);
        assert_eq!(total(&repository, west).await, 1);
    }

    #[tokio::test]
    async fn test_student_id_is_stable() {
        let repository = Repository::in_memory();
        let students = service(&repository);

        let s = students.create(enrol("esther", "555", None)).await.unwrap();
        let generated = s.student_id.clone().unwrap();
        assert!(generated.starts_with("EM/555/"));

        let updated = students
            .update(
                s.id,
                UpdateStudent {
                    first_name: Some("Faith".to_string()),
                    admission_number: Some("556".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.student_id, Some(generated));
        assert_eq!(updated.admission_number, "556");
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let students = service(&Repository::in_memory());
        assert!(matches!(
            students.create(enrol("Gitau", "600", Some(77))).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_admission_number_is_rejected() {
        let repository = Repository::in_memory();
        let students = service(&repository);

        let err = students.create(enrol("Wanjiru", "   ", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(repository.students.list(&StudentQuery::default()).await.unwrap().is_empty());

        let created = students.create(enrol("Wanjiru", " 4400 ", None)).await.unwrap();
        assert_eq!(created.admission_number, "4400");

        let err = students
            .update(
                created.id,
                UpdateStudent {
                    admission_number: Some("  ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(students.get(created.id).await.unwrap().admission_number, "4400");
    }
}
