use serde_json::Value;

/// SQL flavour of the backend a statement is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote(&self, ident: &str) -> String {
        let q = match self {
            Dialect::MySql => '`',
            Dialect::Sqlite => '"',
        };
        let escaped = ident.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }
}

/// A finished statement: SQL text with `?` placeholders plus the values to bind.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// SELECT builder. Identifiers passed here must already be checked against the catalog.
pub struct QueryBuilder {
    dialect: Dialect,
    table: String,
    selects: Vec<String>,
    wheres: Vec<String>,
    params: Vec<Value>,
}

impl QueryBuilder {
    pub fn new(dialect: Dialect, table: &str) -> Self {
        Self {
            dialect,
            table: table.to_string(),
            selects: vec!["*".to_string()],
            wheres: vec![],
            params: Vec::new(),
        }
    }

    pub fn count(mut self, alias: &str) -> Self {
        self.selects = vec![format!("COUNT(*) AS {}", self.dialect.quote(alias))];
        self
    }

    pub fn max_or_zero(mut self, column: &str, alias: &str) -> Self {
        self.selects = vec![format!(
            "COALESCE(MAX({}), 0) AS {}",
            self.dialect.quote(column),
            self.dialect.quote(alias)
        )];
        self
    }

    pub fn r#where(mut self, column: &str, value: Value) -> Self {
        self.wheres.push(format!("{} = ?", self.dialect.quote(column)));
        self.params.push(value);
        self
    }

    fn build_sql(&self) -> String {
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.selects.join(", "),
            self.dialect.quote(&self.table)
        );
        if !self.wheres.is_empty() {
            sql += &format!(" WHERE {}", self.wheres.join(" AND "));
        }
        sql
    }

    pub fn build(self) -> Statement {
        Statement {
            sql: self.build_sql(),
            params: self.params,
        }
    }
}

pub fn insert(dialect: Dialect, table: &str, values: Vec<(String, Value)>) -> Statement {
    let cols: Vec<String> = values.iter().map(|(c, _)| dialect.quote(c)).collect();
    let placeholders = vec!["?"; values.len()];
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote(table),
        cols.join(", "),
        placeholders.join(", ")
    );
    Statement {
        sql,
        params: values.into_iter().map(|(_, v)| v).collect(),
    }
}

pub fn update(
    dialect: Dialect,
    table: &str,
    sets: Vec<(String, Value)>,
    key_column: &str,
    key: Value,
) -> Statement {
    let assignments: Vec<String> = sets
        .iter()
        .map(|(c, _)| format!("{} = ?", dialect.quote(c)))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        dialect.quote(table),
        assignments.join(", "),
        dialect.quote(key_column)
    );
    let mut params: Vec<Value> = sets.into_iter().map(|(_, v)| v).collect();
    params.push(key);
    Statement { sql, params }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quotes_per_dialect() {
        assert_eq!(Dialect::MySql.quote("users"), "`users`");
        assert_eq!(Dialect::Sqlite.quote("users"), "\"users\"");
    }

    #[test]
    fn doubles_embedded_quotes() {
        assert_eq!(Dialect::MySql.quote("we`ird"), "`we``ird`");
        assert_eq!(Dialect::Sqlite.quote("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn select_by_key_binds_value() {
        let stmt = QueryBuilder::new(Dialect::MySql, "users")
            .r#where("id", json!("7"))
            .build();
        assert_eq!(stmt.sql, "SELECT * FROM `users` WHERE `id` = ?");
        assert_eq!(stmt.params, vec![json!("7")]);
    }

    #[test]
    fn count_and_max() {
        let count = QueryBuilder::new(Dialect::Sqlite, "users").count("count").build();
        assert_eq!(count.sql, "SELECT COUNT(*) AS \"count\" FROM \"users\"");
        assert!(count.params.is_empty());

        let max = QueryBuilder::new(Dialect::MySql, "users")
            .max_or_zero("id", "max_id")
            .build();
        assert_eq!(max.sql, "SELECT COALESCE(MAX(`id`), 0) AS `max_id` FROM `users`");
    }

    #[test]
    fn insert_lists_columns_in_order() {
        let stmt = insert(
            Dialect::MySql,
            "users",
            vec![("id".into(), json!(1)), ("name".into(), json!("Ana"))],
        );
        assert_eq!(stmt.sql, "INSERT INTO `users` (`id`, `name`) VALUES (?, ?)");
        assert_eq!(stmt.params, vec![json!(1), json!("Ana")]);
    }

    #[test]
    fn update_binds_key_last() {
        let stmt = update(
            Dialect::Sqlite,
            "users",
            vec![("name".into(), json!("Ana Maria")), ("age".into(), json!(30))],
            "id",
            json!("1"),
        );
        assert_eq!(
            stmt.sql,
            "UPDATE \"users\" SET \"name\" = ?, \"age\" = ? WHERE \"id\" = ?"
        );
        assert_eq!(stmt.params, vec![json!("Ana Maria"), json!(30), json!("1")]);
    }
}
