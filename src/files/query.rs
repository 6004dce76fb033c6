use crate::models::User;
#[cfg(test)]
use crate::models::FileDocument;

/// Record fields a query can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Owner,
    Users,
}

impl Field {
    fn column(self) -> &'static str {
        match self {
            Field::Owner => "file_documents.owner",
            Field::Users => "file_documents.users",
        }
    }

    #[cfg(test)]
    fn values(self, doc: &FileDocument) -> FieldValue<'_> {
        match self {
            Field::Owner => FieldValue::Scalar(&doc.owner),
            Field::Users => FieldValue::List(&doc.users),
        }
    }
}

#[cfg(test)]
enum FieldValue<'a> {
    Scalar(&'a str),
    List(&'a [String]),
}

/// Filter expression over file records.
///
/// `Equal` holds when the field equals any of the values, `Contains` when a
/// list field has any of the values as an element. On `owner` both compare
/// for equality; on `users` both test membership.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Equal(Field, Vec<String>),
    Contains(Field, Vec<String>),
    Or(Vec<Query>),
}

impl Query {
    pub fn equal<I, S>(field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::Equal(field, values.into_iter().map(Into::into).collect())
    }

    pub fn contains<I, S>(field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::Contains(field, values.into_iter().map(Into::into).collect())
    }

    /// In-process evaluation, matching what [`Query::to_sql`] selects.
    #[cfg(test)]
    pub fn matches(&self, doc: &FileDocument) -> bool {
        match self {
            Query::Equal(field, values) | Query::Contains(field, values) => match field.values(doc) {
                FieldValue::Scalar(v) => values.iter().any(|x| x == v),
                FieldValue::List(items) => items.iter().any(|i| values.contains(i)),
            },
            Query::Or(qs) => qs.iter().any(|q| q.matches(doc)),
        }
    }

    /// Renders a SQLite boolean expression, pushing bind values in placeholder order.
    pub fn to_sql(&self, binds: &mut Vec<String>) -> String {
        match self {
            Query::Equal(_, values) | Query::Contains(_, values) if values.is_empty() => "0".into(),
            Query::Equal(Field::Users, values) | Query::Contains(Field::Users, values) => {
                let list = placeholders(values, binds);
                format!(
                    "EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value IN ({list}))",
                    Field::Users.column()
                )
            }
            Query::Equal(field, values) | Query::Contains(field, values) => {
                format!("{} IN ({})", field.column(), placeholders(values, binds))
            }
            Query::Or(qs) if qs.is_empty() => "0".into(),
            Query::Or(qs) => {
                let parts: Vec<String> = qs.iter().map(|q| q.to_sql(binds)).collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }
}

fn placeholders(values: &[String], binds: &mut Vec<String>) -> String {
    binds.extend(values.iter().cloned());
    vec!["?"; values.len()].join(", ")
}

/// Files the user owns or has been given access to by email.
// TODO: compose search, sort and limit once the listing route takes them.
pub fn create_queries(user: &User) -> Vec<Query> {
    vec![Query::Or(vec![
        Query::equal(Field::Owner, [user.id.as_str()]),
        Query::contains(Field::Users, [user.email.as_str()]),
    ])]
}
