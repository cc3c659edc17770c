//! Diesel ORM models for database tables.

use diesel::prelude::*;

use crate::schema;

/// Author record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::authors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AuthorRecord {
    pub id: i32,
    pub handle: String,
}

/// New author for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::authors)]
pub struct NewAuthor<'a> {
    pub handle: &'a str,
}

/// Topic record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::topics)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TopicRecord {
    pub id: i32,
    pub title: String,
    pub author_id: i32,
}

/// New topic for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::topics)]
pub struct NewTopic<'a> {
    pub title: &'a str,
    pub author_id: i32,
}

/// Topic URL record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::topic_urls)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TopicUrlRecord {
    pub id: i32,
    pub link: String,
    pub author_id: i32,
    pub topic_id: i32,
}

/// New topic URL for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::topic_urls)]
pub struct NewTopicUrl<'a> {
    pub link: &'a str,
    pub author_id: i32,
    pub topic_id: i32,
}

/// Post record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::posts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PostRecord {
    pub id: i32,
    pub content: String,
    pub author_id: i32,
    pub topic_id: i32,
    pub topic_url_id: i32,
    pub created_at: String,
    pub toxicity: f64,
    pub severe_toxicity: f64,
    pub obscene: f64,
    pub identity_attack: f64,
    pub insult: f64,
    pub threat: f64,
    pub sexual_explicit: f64,
}

/// New post for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::posts)]
pub struct NewPost<'a> {
    pub content: &'a str,
    pub author_id: i32,
    pub topic_id: i32,
    pub topic_url_id: i32,
    pub created_at: &'a str,
    pub toxicity: f64,
    pub severe_toxicity: f64,
    pub obscene: f64,
    pub identity_attack: f64,
    pub insult: f64,
    pub threat: f64,
    pub sexual_explicit: f64,
}
