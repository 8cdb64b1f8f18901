//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use validator::Validate;

use super::email::EmailService;
use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        student::Student,
        user::{
            CreateUser, LoginResponse, NewUser, ProfileChanges, RegisterUser, Role, UpdateProfile,
            User, UserClaims, UserQuery,
        },
    },
    repository::Repository,
};

const TEMPORARY_PASSWORD_LENGTH: usize = 12;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
    email: EmailService,
}

/// Trimmed, `None` when blank
fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig, email: EmailService) -> Self {
        Self {
            repository,
            config,
            email,
        }
    }

    /// Staff login with username, email or phone plus password
    pub async fn login(&self, identifier: &str, password: &str) -> AppResult<LoginResponse> {
        let user = self
            .repository
            .users
            .find_by_login(identifier)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid login or password".to_string()))?;

        if !self.verify_password(&user, password)? {
            tracing::info!(user_id = user.id, "Failed login attempt");
            return Err(AppError::Authentication("Invalid login or password".to_string()));
        }

        if !user.role.is_staff() {
            return Err(AppError::Authentication(
                "Students log in with their first name and admission number".to_string(),
            ));
        }

        tracing::info!(user_id = user.id, role = %user.role, "User logged in");
        self.login_response(user)
    }

    /// Student login with first name and admission number.
    /// The account is created on first login for an enrolled student.
    pub async fn student_login(&self, first_name: &str, admission_number: &str) -> AppResult<LoginResponse> {
        let invalid = || AppError::Authentication("Invalid first name or admission number".to_string());

        let student = self
            .repository
            .students
            .get_by_admission_number(admission_number)
            .await?
            .filter(|s| s.first_name.to_lowercase() == first_name.trim().to_lowercase())
            .ok_or_else(invalid)?;

        let user = match self
            .repository
            .users
            .find_student(&student.admission_number)
            .await?
        {
            Some(user) if user.first_name == student.first_name && user.last_name == student.last_name => user,
            // Names follow the student record after staff edits
            Some(user) => {
                self.repository
                    .users
                    .update_profile(
                        user.id,
                        &ProfileChanges {
                            first_name: Some(student.first_name.clone()),
                            last_name: Some(student.last_name.clone()),
                            ..Default::default()
                        },
                    )
                    .await?
            }
            None => self.create_student_account(&student).await?,
        };

        self.login_response(user)
    }

    /// Account for a student logging in for the first time. The username is
    /// the admission number, or `student-<admission>` when that name is taken.
    async fn create_student_account(&self, student: &Student) -> AppResult<User> {
        let mut account = NewUser {
            username: student.admission_number.clone(),
            email: None,
            password: None,
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            role: Role::Student,
            admission_number: Some(student.admission_number.clone()),
            phone: None,
        };

        let user = match self.repository.users.create(&account).await {
            Err(AppError::Conflict(_)) => {
                account.username = format!("student-{}", student.admission_number);
                self.repository.users.create(&account).await?
            }
            other => other?,
        };
        tracing::info!(user_id = user.id, "Student account created on first login");
        Ok(user)
    }

    /// Self-service registration; always creates a student account
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        request.validate()?;
        let password = self.hash_password(&request.password)?;

        let user = self
            .repository
            .users
            .create(&NewUser {
                username: request.username.trim().to_string(),
                email: Some(request.email.trim().to_string()),
                password: Some(password),
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                role: Role::Student,
                admission_number: optional(request.admission_number),
                phone: optional(request.phone),
            })
            .await?;

        if let Some(email) = &user.email {
            let name = format!("{} {}", user.first_name, user.last_name);
            self.email.send_welcome(email, name.trim(), &user.username);
        }

        tracing::info!(user_id = user.id, "User registered");
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Update own profile; a new password requires the current one
    pub async fn update_profile(&self, user_id: i32, profile: UpdateProfile) -> AppResult<User> {
        profile.validate()?;
        let user = self.repository.users.get_by_id(user_id).await?;

        let password = match &profile.new_password {
            Some(new_password) => {
                let current = profile.current_password.as_deref().ok_or_else(|| {
                    AppError::Validation("Current password required to change password".to_string())
                })?;
                if !self.verify_password(&user, current)? {
                    return Err(AppError::Authentication("Current password is incorrect".to_string()));
                }
                Some(self.hash_password(new_password)?)
            }
            None => None,
        };

        self.repository
            .users
            .update_profile(
                user_id,
                &ProfileChanges {
                    first_name: optional(profile.first_name),
                    last_name: optional(profile.last_name),
                    email: optional(profile.email),
                    phone: optional(profile.phone),
                    password,
                },
            )
            .await
    }

    /// Mail a temporary password. Unknown addresses succeed silently.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        let Some(user) = self.repository.users.find_by_email(email).await? else {
            tracing::info!("Password reset requested for an unknown address");
            return Ok(());
        };

        let temporary: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TEMPORARY_PASSWORD_LENGTH)
            .map(char::from)
            .collect();
        let hash = self.hash_password(&temporary)?;
        self.repository.users.set_password(user.id, &hash).await?;

        if let Some(to) = &user.email {
            self.email.send_temporary_password(to, &user.username, &temporary);
        }
        tracing::info!(user_id = user.id, "Temporary password issued");
        Ok(())
    }

    pub async fn list(&self, query: &UserQuery) -> AppResult<Vec<User>> {
        self.repository.users.list(query).await
    }

    /// Create an account (administrators); only a super admin creates super admins
    pub async fn create_user(&self, request: CreateUser, acting: &UserClaims) -> AppResult<User> {
        request.validate()?;
        if request.role == Role::SuperAdmin {
            acting.require_super_admin()?;
        }

        let password = match &request.password {
            Some(password) => Some(self.hash_password(password)?),
            None => None,
        };

        let user = self
            .repository
            .users
            .create(&NewUser {
                username: request.username.trim().to_string(),
                email: optional(request.email),
                password,
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                role: request.role,
                admission_number: optional(request.admission_number),
                phone: optional(request.phone),
            })
            .await?;
        tracing::info!(user_id = user.id, role = %user.role, created_by = acting.user_id, "User created");
        Ok(user)
    }

    /// Change a role; granting or revoking super admin needs a super admin
    pub async fn set_role(&self, id: i32, role: Role, acting: &UserClaims) -> AppResult<User> {
        let target = self.repository.users.get_by_id(id).await?;
        if role == Role::SuperAdmin || target.role == Role::SuperAdmin {
            acting.require_super_admin()?;
        }
        let user = self.repository.users.set_role(id, role).await?;
        tracing::info!(user_id = id, from = %target.role, to = %role, changed_by = acting.user_id, "Role changed");
        Ok(user)
    }

    /// Delete an account; borrows it processed are kept
    pub async fn delete_user(&self, id: i32, acting: &UserClaims) -> AppResult<()> {
        if id == acting.user_id {
            return Err(AppError::Validation("You cannot delete your own account".to_string()));
        }
        let target = self.repository.users.get_by_id(id).await?;
        if target.role == Role::SuperAdmin {
            acting.require_super_admin()?;
        }
        self.repository.users.delete(id).await?;
        tracing::info!(user_id = id, deleted_by = acting.user_id, "User deleted");
        Ok(())
    }

    fn login_response(&self, user: User) -> AppResult<LoginResponse> {
        let expires_in = self.config.jwt_expiration_hours as i64 * 3600;
        let now = Utc::now().timestamp();

        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            role: user.role,
            admission_number: user.admission_number.clone(),
            exp: now + expires_in,
            iat: now,
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in,
            user,
        })
    }

    /// Verify user password
    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        if let Some(ref hash) = user.password {
            let parsed_hash = PasswordHash::new(hash)
                .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
            return Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok());
        }

        Ok(false)
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EmailConfig,
        models::student::StudentRecord,
    };

    fn service(repository: &Repository) -> UsersService {
        UsersService::new(
            repository.clone(),
            AuthConfig::default(),
            EmailService::new(EmailConfig::default()),
        )
    }

    fn claims(user_id: i32, role: Role) -> UserClaims {
        UserClaims {
            sub: "acting".to_string(),
            user_id,
            role,
            admission_number: None,
            exp: Utc::now().timestamp() + 60,
            iat: Utc::now().timestamp(),
        }
    }

    fn staff_account(username: &str, role: Role) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            email: Some(format!("{}@school.test", username)),
            password: Some("correct horse".to_string()),
            first_name: "Mary".to_string(),
            last_name: "Njeri".to_string(),
            role,
            admission_number: None,
            phone: Some("0700000001".to_string()),
        }
    }

    #[tokio::test]
    async fn test_staff_login_by_username_email_or_phone() {
        let repository = Repository::in_memory();
        let users = service(&repository);
        users
            .create_user(staff_account("librarian", Role::Staff), &claims(0, Role::Admin))
            .await
            .unwrap();

        for identifier in ["librarian", "LIBRARIAN@school.test", "0700000001"] {
            let response = users.login(identifier, "correct horse").await.unwrap();
            assert_eq!(response.user.username, "librarian");
            let parsed = UserClaims::from_token(&response.token, &AuthConfig::default().jwt_secret).unwrap();
            assert_eq!(parsed.role, Role::Staff);
        }

        assert!(matches!(
            users.login("librarian", "wrong").await,
            Err(AppError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_registered_students_cannot_use_staff_login() {
        let repository = Repository::in_memory();
        let users = service(&repository);
        let user = users
            .register(RegisterUser {
                username: "pupil".to_string(),
                email: "pupil@school.test".to_string(),
                password: "long enough".to_string(),
                first_name: "Paul".to_string(),
                last_name: "Otieno".to_string(),
                admission_number: None,
                phone: None,
            })
            .await
            .unwrap();
        assert_eq!(user.role, Role::Student);
        assert!(matches!(
            users.login("pupil", "long enough").await,
            Err(AppError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_student_login_creates_account_once() {
        let repository = Repository::in_memory();
        repository
            .students
            .create(&StudentRecord {
                first_name: "Wanjiku".to_string(),
                last_name: "Kariuki".to_string(),
                admission_number: "7001".to_string(),
                student_id: None,
                year_of_study: 4,
                current_class: "4B".to_string(),
                picture: None,
                room_id: None,
            })
            .await
            .unwrap();
        let users = service(&repository);

        let first = users.student_login("wanjiku", "7001").await.unwrap();
        let second = users.student_login("Wanjiku", "7001").await.unwrap();
        assert_eq!(first.user.id, second.user.id);
        assert_eq!(first.user.admission_number.as_deref(), Some("7001"));

        assert!(matches!(
            users.student_login("Someone", "7001").await,
            Err(AppError::Authentication(_))
        ));
    }

    fn enrolled(first_name: &str, admission_number: &str) -> StudentRecord {
        StudentRecord {
            first_name: first_name.to_string(),
            last_name: "Mwangi".to_string(),
            admission_number: admission_number.to_string(),
            student_id: None,
            year_of_study: 2,
            current_class: "2A".to_string(),
            picture: None,
            room_id: None,
        }
    }

    #[tokio::test]
    async fn test_student_login_after_rename_keeps_account() {
        let repository = Repository::in_memory();
        let student = repository.students.create(&enrolled("Jon", "777")).await.unwrap();
        let users = service(&repository);

        let first = users.student_login("Jon", "777").await.unwrap();
        repository
            .students
            .update(student.id, &enrolled("John", "777"))
            .await
            .unwrap();

        assert!(matches!(
            users.student_login("Jon", "777").await,
            Err(AppError::Authentication(_))
        ));
        let second = users.student_login("john", "777").await.unwrap();
        assert_eq!(second.user.id, first.user.id);
        assert_eq!(second.user.first_name, "John");
    }

    #[tokio::test]
    async fn test_student_login_when_admission_number_is_a_taken_username() {
        let repository = Repository::in_memory();
        repository.students.create(&enrolled("Achieng", "5050")).await.unwrap();
        let users = service(&repository);
        users
            .create_user(staff_account("5050", Role::Staff), &claims(0, Role::Admin))
            .await
            .unwrap();

        let response = users.student_login("Achieng", "5050").await.unwrap();
        assert_eq!(response.user.role, Role::Student);
        assert_eq!(response.user.username, "student-5050");

        let again = users.student_login("Achieng", "5050").await.unwrap();
        assert_eq!(again.user.id, response.user.id);
    }

    #[tokio::test]
    async fn test_only_super_admin_grants_super_admin() {
        let repository = Repository::in_memory();
        let users = service(&repository);
        let target = users
            .create_user(staff_account("desk", Role::Staff), &claims(0, Role::Admin))
            .await
            .unwrap();

        assert!(matches!(
            users.set_role(target.id, Role::SuperAdmin, &claims(0, Role::Admin)).await,
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            users
                .create_user(staff_account("boss", Role::SuperAdmin), &claims(0, Role::Admin))
                .await,
            Err(AppError::Authorization(_))
        ));

        let promoted = users
            .set_role(target.id, Role::Admin, &claims(0, Role::Admin))
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Admin);
        assert!(users
            .set_role(target.id, Role::SuperAdmin, &claims(0, Role::SuperAdmin))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_profile_password_change_and_reset() {
        let repository = Repository::in_memory();
        let users = service(&repository);
        let user = users
            .create_user(staff_account("clerk", Role::Staff), &claims(0, Role::Admin))
            .await
            .unwrap();

        let missing_current = UpdateProfile {
            new_password: Some("new password".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            users.update_profile(user.id, missing_current).await,
            Err(AppError::Validation(_))
        ));

        users
            .update_profile(
                user.id,
                UpdateProfile {
                    current_password: Some("correct horse".to_string()),
                    new_password: Some("new password".to_string()),
                    phone: Some("0711111111".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(users.login("clerk", "new password").await.is_ok());

        users.request_password_reset("clerk@school.test").await.unwrap();
        assert!(users.login("clerk", "new password").await.is_err());
        assert!(users.request_password_reset("nobody@school.test").await.is_ok());
    }

    #[tokio::test]
    async fn test_cannot_delete_self() {
        let repository = Repository::in_memory();
        let users = service(&repository);
        let admin = users
            .create_user(staff_account("admin", Role::Admin), &claims(0, Role::Admin))
            .await
            .unwrap();
        assert!(matches!(
            users.delete_user(admin.id, &claims(admin.id, Role::Admin)).await,
            Err(AppError::Validation(_))
        ));
        assert!(users.delete_user(admin.id, &claims(999, Role::Admin)).await.is_ok());
    }
}
