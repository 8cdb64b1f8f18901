//! Revision paper sharing

use chrono::Utc;
use validator::Validate;

use super::required;
use crate::{
    error::{AppError, AppResult},
    models::revision_paper::{CreateRevisionPaper, NewRevisionPaper, RevisionPaper, RevisionPaperQuery},
    repository::Repository,
};

#[derive(Clone)]
pub struct RevisionPapersService {
    repository: Repository,
}

impl RevisionPapersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &RevisionPaperQuery) -> AppResult<Vec<RevisionPaper>> {
        self.repository.revision_papers.list(query).await
    }

    /// Papers shared with the room of the student holding `admission_number`
    pub async fn list_for_student(
        &self,
        admission_number: &str,
        query: RevisionPaperQuery,
    ) -> AppResult<Vec<RevisionPaper>> {
        let student = self
            .repository
            .students
            .get_by_admission_number(admission_number)
            .await?
            .ok_or_else(|| AppError::UnknownStudent(admission_number.to_string()))?;

        match student.room_id {
            Some(room_id) => {
                self.list(&RevisionPaperQuery {
                    room_id: Some(room_id),
                    ..query
                })
                .await
            }
            None => Ok(Vec::new()),
        }
    }

    pub async fn upload(&self, paper: CreateRevisionPaper, uploaded_by: Option<i32>) -> AppResult<RevisionPaper> {
        paper.validate()?;
        let title = required("Title", &paper.title)?;
        let subject = required("Subject", &paper.subject)?;
        let file = required("File reference", &paper.file)?;
        if let Some(room_id) = paper.room_id {
            self.repository.rooms.get_by_id(room_id).await?;
        }

        let created = self
            .repository
            .revision_papers
            .create(&NewRevisionPaper {
                title,
                subject,
                file,
                room_id: paper.room_id,
                uploaded_by,
                uploaded_at: Utc::now(),
            })
            .await?;
        tracing::info!(paper_id = created.id, room_id = ?created.room_id, "Revision paper uploaded");
        Ok(created)
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.revision_papers.delete(id).await
    }
}
