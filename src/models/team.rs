use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const INVITE_PENDING: &str = "pending";
pub const INVITE_ACCEPTED: &str = "accepted";
pub const INVITE_REVOKED: &str = "revoked";

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeamInvite {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub status: String,
    pub organization_id: Uuid,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TeamInvite {
    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, FromRow)]
pub struct MemberRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub status: &'static str,
    pub role: &'static str,
}

impl TeamMember {
    pub fn from_row(row: MemberRow, caller: Uuid) -> Self {
        TeamMember {
            role: if row.id == caller { "owner" } else { "member" },
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
            status: "active",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeamOverview {
    pub members: Vec<TeamMember>,
    pub invites: Vec<TeamInvite>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    #[serde(default)]
    pub email: String,
    pub role: Option<String>,
}

/// Roles an invite may grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteRole {
    Member,
    Admin,
}

impl InviteRole {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.map(str::trim) {
            None | Some("") | Some("member") => Some(InviteRole::Member),
            Some("admin") => Some(InviteRole::Admin),
            Some(_) => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InviteRole::Member => "member",
            InviteRole::Admin => "admin",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteResponse {
    pub success: bool,
    pub organization_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn invite_role_defaults_to_member() {
        assert_eq!(InviteRole::parse(None), Some(InviteRole::Member));
        assert_eq!(InviteRole::parse(Some("admin")), Some(InviteRole::Admin));
        assert_eq!(InviteRole::parse(Some("owner")), None);
    }

    #[test]
    fn caller_is_reported_as_owner() {
        let caller = Uuid::new_v4();
        let row = MemberRow {
            id: caller,
            name: None,
            email: "me@x.io".into(),
            created_at: Utc::now(),
        };
        assert_eq!(TeamMember::from_row(row, caller).role, "owner");
    }

    #[test]
    fn expiry_is_checked_against_now() {
        let now = Utc::now();
        let invite = TeamInvite {
            id: Uuid::new_v4(),
            email: "x@y.z".into(),
            role: "member".into(),
            status: INVITE_PENDING.into(),
            organization_id: Uuid::new_v4(),
            expires_at: now - Duration::seconds(1),
            created_at: now - Duration::days(7),
        };
        assert!(invite.is_expired_at(now));
        assert!(!invite.is_expired_at(now - Duration::days(1)));
    }
}
