use sqlx::{Encode, Postgres, QueryBuilder, Type};

/// Builds `UPDATE <table> SET a = $1, b = $2 ...` from the fields a patch
/// actually carries. Columns are compile-time constants; values are always bound.
pub struct UpdateBuilder<'args> {
    query: QueryBuilder<'args, Postgres>,
    assignments: usize,
}

impl<'args> UpdateBuilder<'args> {
    pub fn new(table: &'static str) -> Self {
        let mut query = QueryBuilder::new("UPDATE ");
        query.push(table).push(" SET ");
        Self { query, assignments: 0 }
    }

    fn separator(&mut self) {
        if self.assignments > 0 {
            self.query.push(", ");
        }
        self.assignments += 1;
    }

    /// `column = <bound value>`
    pub fn set<T>(&mut self, column: &'static str, value: T) -> &mut Self
    where
        T: 'args + Encode<'args, Postgres> + Type<Postgres> + Send,
    {
        self.separator();
        self.query.push(column).push(" = ").push_bind(value);
        self
    }

    /// Set only when the patch carries the field
    pub fn set_if<T>(&mut self, column: &'static str, value: Option<T>) -> &mut Self
    where
        T: 'args + Encode<'args, Postgres> + Type<Postgres> + Send,
    {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    /// `column = <sql expression>` for server-side values such as `NOW()`
    pub fn set_expr(&mut self, column: &'static str, expression: &'static str) -> &mut Self {
        self.separator();
        self.query.push(column).push(" = ").push(expression);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments == 0
    }

    /// Append `WHERE <column> = <id>` plus any trailing clause and hand back the builder
    pub fn finish(mut self, id_column: &'static str, id: i64, trailer: &str) -> QueryBuilder<'args, Postgres> {
        self.query.push(" WHERE ").push(id_column).push(" = ").push_bind(id);
        if !trailer.is_empty() {
            self.query.push(" ").push(trailer);
        }
        self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_only_present_assignments() {
        let mut update = UpdateBuilder::new("datasets");
        update
            .set_if("name", Some("Sales".to_string()))
            .set_if::<String>("category", None)
            .set_expr("last_updated", "NOW()");
        assert!(!update.is_empty());

        let query = update.finish("id", 5, "");
        assert_eq!(
            query.sql(),
            "UPDATE datasets SET name = $1, last_updated = NOW() WHERE id = $2"
        );
    }

    #[test]
    fn empty_patch_is_detectable() {
        let mut update = UpdateBuilder::new("users");
        update.set_if::<String>("first_name", None);
        assert!(update.is_empty());
    }
}
