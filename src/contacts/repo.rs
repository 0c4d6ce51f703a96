use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::contacts::dto::ContactPayload;

/// Contact record. `user_id` is set at creation and never changes; every
/// query below filters on it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub sur_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: Date,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
}

impl Contact {
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, user_id, name, sur_name, email, phone, birthday, notes, created_at
            FROM contacts
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id(
        db: &PgPool,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, user_id, name, sur_name, email, phone, birthday, notes, created_at
            FROM contacts
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(contact_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn find_by_name(
        db: &PgPool,
        user_id: Uuid,
        name: &str,
    ) -> anyhow::Result<Option<Contact>> {
        Self::find_by_column(db, user_id, "name", name).await
    }

    pub async fn find_by_sur_name(
        db: &PgPool,
        user_id: Uuid,
        sur_name: &str,
    ) -> anyhow::Result<Option<Contact>> {
        Self::find_by_column(db, user_id, "sur_name", sur_name).await
    }

    pub async fn find_by_email(
        db: &PgPool,
        user_id: Uuid,
        email: &str,
    ) -> anyhow::Result<Option<Contact>> {
        Self::find_by_column(db, user_id, "email", email).await
    }

    pub async fn find_by_phone(
        db: &PgPool,
        user_id: Uuid,
        phone: &str,
    ) -> anyhow::Result<Option<Contact>> {
        Self::find_by_column(db, user_id, "phone", phone).await
    }

    async fn find_by_column(
        db: &PgPool,
        user_id: Uuid,
        column: &'static str,
        value: &str,
    ) -> anyhow::Result<Option<Contact>> {
        // column comes from the fixed set above, never from input
        let sql = format!(
            r#"
            SELECT id, user_id, name, sur_name, email, phone, birthday, notes, created_at
            FROM contacts
            WHERE {column} = $1 AND user_id = $2
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, Contact>(&sql)
            .bind(value)
            .bind(user_id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        body: &ContactPayload,
    ) -> anyhow::Result<Contact> {
        let row = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (user_id, name, sur_name, email, phone, birthday, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, name, sur_name, email, phone, birthday, notes, created_at
            "#,
        )
        .bind(user_id)
        .bind(&body.name)
        .bind(&body.sur_name)
        .bind(&body.email)
        .bind(&body.phone)
        .bind(body.birthday)
        .bind(&body.notes)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    /// Full overwrite of the mutable fields. `user_id` stays untouched.
    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        contact_id: Uuid,
        body: &ContactPayload,
    ) -> anyhow::Result<Contact> {
        let row = sqlx::query_as::<_, Contact>(
            r#"
            UPDATE contacts
            SET name = $1, sur_name = $2, email = $3, phone = $4, birthday = $5, notes = $6
            WHERE id = $7 AND user_id = $8
            RETURNING id, user_id, name, sur_name, email, phone, birthday, notes, created_at
            "#,
        )
        .bind(&body.name)
        .bind(&body.sur_name)
        .bind(&body.email)
        .bind(&body.phone)
        .bind(body.birthday)
        .bind(&body.notes)
        .bind(contact_id)
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    /// Delete and return the row's prior state as confirmation.
    pub async fn delete(
        db: &PgPool,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(
            r#"
            DELETE FROM contacts
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name, sur_name, email, phone, birthday, notes, created_at
            "#,
        )
        .bind(contact_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Contacts whose birthday falls within the next 7 calendar days,
    /// including across a year boundary.
    pub async fn upcoming_birthdays(
        db: &PgPool,
        user_id: Uuid,
        today: Date,
    ) -> anyhow::Result<Vec<Contact>> {
        let all = Self::list_by_user(db, user_id).await?;
        Ok(all
            .into_iter()
            .filter(|c| birthday_within_week(c.birthday, today))
            .collect())
    }
}

/// The birthday's month/day projected onto `year`. Feb 29 clamps to Feb 28
/// when `year` is not a leap year.
fn occurrence_in_year(birthday: Date, year: i32) -> Date {
    Date::from_calendar_date(year, birthday.month(), birthday.day())
        .or_else(|_| Date::from_calendar_date(year, birthday.month(), 28))
        .unwrap_or(birthday)
}

/// True when the next occurrence of the birthday is within today..=today+7.
/// The occurrence is normalized onto the current year, or the next one if
/// it already passed, so Dec 28 correctly picks up early-January birthdays.
pub(crate) fn birthday_within_week(birthday: Date, today: Date) -> bool {
    let mut next = occurrence_in_year(birthday, today.year());
    if next < today {
        next = occurrence_in_year(birthday, today.year() + 1);
    }
    (next - today).whole_days() <= 7
}

#[cfg(test)]
mod birthday_tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn includes_birthday_later_this_week() {
        assert!(birthday_within_week(date!(1988 - 06 - 15), date!(2024 - 06 - 12)));
    }

    #[test]
    fn includes_birthday_today() {
        assert!(birthday_within_week(date!(1988 - 06 - 12), date!(2024 - 06 - 12)));
    }

    #[test]
    fn excludes_birthday_that_already_passed() {
        assert!(!birthday_within_week(date!(1988 - 06 - 10), date!(2024 - 06 - 12)));
    }

    #[test]
    fn year_wrap_includes_early_january() {
        // today = Dec 28: Jan 2 of any birth year is 5 days away
        assert!(birthday_within_week(date!(1990 - 01 - 02), date!(2023 - 12 - 28)));
    }

    #[test]
    fn year_wrap_excludes_late_december_past() {
        assert!(!birthday_within_week(date!(1990 - 12 - 20), date!(2023 - 12 - 28)));
    }

    #[test]
    fn window_is_inclusive_at_seven_days() {
        assert!(birthday_within_week(date!(1988 - 06 - 19), date!(2024 - 06 - 12)));
        assert!(!birthday_within_week(date!(1988 - 06 - 20), date!(2024 - 06 - 12)));
    }

    #[test]
    fn leap_day_clamps_to_feb_28() {
        // 2023 is not a leap year: Feb 29 birthdays surface as Feb 28
        assert!(birthday_within_week(date!(2000 - 02 - 29), date!(2023 - 02 - 25)));
        assert!(!birthday_within_week(date!(2000 - 02 - 29), date!(2023 - 03 - 01)));
    }
}
