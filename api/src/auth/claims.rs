use serde::{Deserialize, Serialize};

/// Claims asserted by the external identity provider. The core trusts them
/// as-is and never re-authenticates.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
    /// `student`, `professor` or `admin`.
    pub role: String,
}

impl Claims {
    pub fn is_student(&self) -> bool {
        self.role == "student"
    }

    pub fn is_professor(&self) -> bool {
        self.role == "professor"
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    /// Professors and admins may review leave requests and manage records.
    pub fn is_staff(&self) -> bool {
        self.is_professor() || self.is_admin()
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);
