//! Operator identity of a counting run.
//!
//! Runs were historically signed with a free-text name; newer clients sign with
//! a registered shop user. Both are carried by one tagged value, mapped to the
//! two run columns on write and back on read.

use crate::{
    config::StoreCapabilities,
    entities::{ShopUser, counting_run},
    errors::{Error, Result},
};
use sea_orm::{Condition, prelude::*};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who is counting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OperatorIdentity {
    /// Free-text display name (legacy clients)
    LegacyName(String),
    /// Registered shop user
    RegisteredUser(i64),
}

impl OperatorIdentity {
    /// Legacy identity with surrounding whitespace removed.
    pub fn legacy(name: impl AsRef<str>) -> Self {
        Self::LegacyName(name.as_ref().trim().to_string())
    }

    /// Reads the identity stored on a run. A registered user wins if both
    /// columns were somehow set.
    #[must_use]
    pub fn from_run(run: &counting_run::Model) -> Option<Self> {
        match (&run.shop_user_id, &run.operator_name) {
            (Some(user_id), _) => Some(Self::RegisteredUser(*user_id)),
            (None, Some(name)) => Some(Self::LegacyName(name.clone())),
            (None, None) => None,
        }
    }

    /// Values for the `(operator_name, shop_user_id)` columns.
    #[must_use]
    pub fn columns(&self) -> (Option<String>, Option<i64>) {
        match self {
            Self::LegacyName(name) => (Some(name.clone()), None),
            Self::RegisteredUser(id) => (None, Some(*id)),
        }
    }

    /// Condition matching runs signed by this operator.
    #[must_use]
    pub fn run_condition(&self) -> Condition {
        match self {
            Self::LegacyName(name) => Condition::all()
                .add(counting_run::Column::OperatorName.eq(name.clone()))
                .add(counting_run::Column::ShopUserId.is_null()),
            Self::RegisteredUser(id) => {
                Condition::all().add(counting_run::Column::ShopUserId.eq(*id))
            }
        }
    }

    /// Whether `run` was signed by this operator.
    #[must_use]
    pub fn signed(&self, run: &counting_run::Model) -> bool {
        Self::from_run(run).as_ref() == Some(self)
    }

    /// Checks the identity can sign runs in `shop_id`. Returns the reason when
    /// it cannot.
    pub async fn unresolvable_reason<C>(
        &self,
        db: &C,
        capabilities: &StoreCapabilities,
        shop_id: i64,
    ) -> Result<Option<String>>
    where
        C: ConnectionTrait,
    {
        match self {
            Self::LegacyName(name) if name.trim().is_empty() => {
                Ok(Some("operator name is empty".to_string()))
            }
            Self::LegacyName(_) => Ok(None),
            Self::RegisteredUser(_) if !capabilities.registered_operators => Ok(Some(
                "this store does not support registered operators".to_string(),
            )),
            Self::RegisteredUser(id) => {
                let reason = match ShopUser::find_by_id(*id).one(db).await? {
                    None => Some(format!("user {id} does not exist")),
                    Some(user) if user.shop_id != shop_id => {
                        Some(format!("user {id} belongs to another shop"))
                    }
                    Some(user) if user.disabled => Some(format!("user {id} is disabled")),
                    Some(_) => None,
                };
                Ok(reason)
            }
        }
    }

    /// Fails with a validation error unless the identity can sign runs in
    /// `shop_id`.
    pub async fn ensure_resolvable<C>(
        &self,
        db: &C,
        capabilities: &StoreCapabilities,
        shop_id: i64,
    ) -> Result<()>
    where
        C: ConnectionTrait,
    {
        match self.unresolvable_reason(db, capabilities, shop_id).await? {
            Some(reason) => Err(Error::validation("operator", reason)),
            None => Ok(()),
        }
    }

    /// Single display value, resolved at read time.
    pub async fn display_name<C>(&self, db: &C) -> Result<String>
    where
        C: ConnectionTrait,
    {
        match self {
            Self::LegacyName(name) => Ok(name.clone()),
            Self::RegisteredUser(id) => Ok(ShopUser::find_by_id(*id)
                .one(db)
                .await?
                .map_or_else(|| format!("user #{id}"), |user| user.display_name)),
        }
    }
}

impl fmt::Display for OperatorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LegacyName(name) => write!(f, "{name}"),
            Self::RegisteredUser(id) => write!(f, "user:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn run_with(operator_name: Option<&str>, shop_user_id: Option<i64>) -> counting_run::Model {
        counting_run::Model {
            id: 1,
            session_id: 1,
            location_id: 1,
            count_type: 1,
            started_at: chrono::Utc::now(),
            completed_at: None,
            operator_name: operator_name.map(ToString::to_string),
            shop_user_id,
        }
    }

    #[test]
    fn test_columns_round_trip_through_run() {
        let legacy = OperatorIdentity::legacy("  Alice ");
        assert_eq!(legacy, OperatorIdentity::LegacyName("Alice".to_string()));
        let (name, user) = legacy.columns();
        assert_eq!(
            OperatorIdentity::from_run(&run_with(name.as_deref(), user)),
            Some(legacy)
        );

        let registered = OperatorIdentity::RegisteredUser(42);
        assert_eq!(registered.columns(), (None, Some(42)));
        assert!(registered.signed(&run_with(None, Some(42))));
        assert!(!registered.signed(&run_with(Some("42"), None)));
    }

    #[test]
    fn test_registered_user_wins_when_both_columns_set() {
        let run = run_with(Some("Alice"), Some(7));
        assert_eq!(
            OperatorIdentity::from_run(&run),
            Some(OperatorIdentity::RegisteredUser(7))
        );
        assert_eq!(OperatorIdentity::from_run(&run_with(None, None)), None);
    }

    #[tokio::test]
    async fn test_resolvability() -> Result<()> {
        let env = TestEnv::new().await?;
        let db = &env.ctx.database;
        let caps = StoreCapabilities::current();
        let user = create_test_user(db, env.shop.id, "Bob").await?;
        let other_shop = create_test_shop(db, "Elsewhere").await?;
        let stranger = create_test_user(db, other_shop.id, "Eve").await?;

        let ok = OperatorIdentity::RegisteredUser(user.id);
        assert!(ok.unresolvable_reason(db, &caps, env.shop.id).await?.is_none());
        assert_eq!(ok.display_name(db).await?, "Bob");

        let foreign = OperatorIdentity::RegisteredUser(stranger.id);
        assert!(foreign.unresolvable_reason(db, &caps, env.shop.id).await?.is_some());

        let missing = OperatorIdentity::RegisteredUser(999);
        assert!(missing.ensure_resolvable(db, &caps, env.shop.id).await.is_err());

        let legacy_caps = StoreCapabilities::legacy();
        assert!(ok.unresolvable_reason(db, &legacy_caps, env.shop.id).await?.is_some());

        let blank = OperatorIdentity::legacy("   ");
        assert!(blank.unresolvable_reason(db, &caps, env.shop.id).await?.is_some());
        Ok(())
    }
}
