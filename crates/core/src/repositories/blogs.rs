//! Doctor-authored blog posts.
//!
//! Posts are addressed publicly by slug. Drafts are visible to their author only.

use crate::db::{contains_pattern, not_found, now_timestamp, Database};
use crate::ownership::ensure_doctor_owns;
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX, SHORT_TEXT_MAX};
use crate::{ClinicError, ClinicResult};
use api_shared::{Blog, BlogReq};
use rusqlite::{params, Connection, Row};

const BLOG_SELECT: &str = "SELECT id, doctor_id, title, slug, content, image, is_published,
        created_at, updated_at
    FROM blogs";

/// Posts longer than this are rejected.
const CONTENT_MAX: usize = LONG_TEXT_MAX * 20;

fn blog_from_row(row: &Row<'_>) -> rusqlite::Result<Blog> {
    Ok(Blog {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        title: row.get(2)?,
        slug: row.get(3)?,
        content: row.get(4)?,
        image: row.get(5)?,
        is_published: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn load_blog(conn: &Connection, id: i64) -> ClinicResult<Blog> {
    conn.query_row(&format!("{BLOG_SELECT} WHERE id = ?1"), [id], blog_from_row)
        .map_err(not_found("blog"))
}

/// Lower-case ASCII slug: alphanumeric runs joined by single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("post");
    }
    slug
}

/// First free slug among `base`, `base-2`, `base-3`, ... ignoring the post `except`.
fn unique_slug(conn: &Connection, base: &str, except: Option<i64>) -> ClinicResult<String> {
    let mut candidate = base.to_string();
    let mut suffix = 2;
    loop {
        let taken: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM blogs WHERE slug = ?1 AND (?2 IS NULL OR id != ?2))",
            params![candidate, except],
            |row| row.get(0),
        )?;
        if taken == 0 {
            return Ok(candidate);
        }
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
}

#[derive(Clone, Debug)]
pub struct BlogService {
    db: Database,
}

impl BlogService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Published posts, newest first, optionally filtered by a title fragment.
    pub fn list_published(&self, search: Option<&str>) -> ClinicResult<Vec<Blog>> {
        let search = contains_pattern(search);
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{BLOG_SELECT}
             WHERE is_published = 1 AND (?1 IS NULL OR title LIKE ?1 ESCAPE '\\')
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([search], blog_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every post by `doctor_id`, drafts included.
    pub fn list_for_author(&self, doctor_id: i64) -> ClinicResult<Vec<Blog>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{BLOG_SELECT} WHERE doctor_id = ?1 ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([doctor_id], blog_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Post by slug. Drafts are reported as not found unless `viewer` is the author.
    pub fn get_by_slug(&self, slug: &str, viewer: Option<i64>) -> ClinicResult<Blog> {
        let conn = self.db.lock()?;
        let blog = conn
            .query_row(&format!("{BLOG_SELECT} WHERE slug = ?1"), [slug], blog_from_row)
            .map_err(not_found("blog"))?;
        if !blog.is_published && viewer != Some(blog.doctor_id) {
            return Err(ClinicError::NotFound("blog"));
        }
        Ok(blog)
    }

    pub fn create(&self, doctor_id: i64, req: &BlogReq) -> ClinicResult<Blog> {
        let mut errors = ValidationErrors::new();
        let title = validation::required_text(
            &mut errors,
            "title",
            req.title.as_deref(),
            SHORT_TEXT_MAX,
        );
        let content = validation::required_text(
            &mut errors,
            "content",
            req.content.as_deref(),
            CONTENT_MAX,
        );
        let image = validation::optional_text(
            &mut errors,
            "image",
            req.image.as_deref(),
            SHORT_TEXT_MAX,
        );
        errors.into_result()?;
        let (Some(title), Some(content)) = (title, content) else {
            return Err(ClinicError::InvalidInput("blog fields missing".into()));
        };

        let conn = self.db.lock()?;
        let slug = unique_slug(&conn, &slugify(title.as_str()), None)?;
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO blogs (doctor_id, title, slug, content, image, is_published, created_at,
                                updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                doctor_id,
                title.as_str(),
                slug,
                content.as_str(),
                image,
                req.is_published.unwrap_or(false),
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(blog_id = id, doctor_id, %slug, "blog created");
        load_blog(&conn, id)
    }

    /// Partial update. A new title regenerates the slug.
    pub fn update(&self, doctor_id: i64, id: i64, req: &BlogReq) -> ClinicResult<Blog> {
        let mut errors = ValidationErrors::new();
        let title = match req.title.as_deref() {
            Some(raw) => validation::required_text(&mut errors, "title", Some(raw), SHORT_TEXT_MAX),
            None => None,
        };
        let content = match req.content.as_deref() {
            Some(raw) => validation::required_text(&mut errors, "content", Some(raw), CONTENT_MAX),
            None => None,
        };
        let image = validation::optional_text(
            &mut errors,
            "image",
            req.image.as_deref(),
            SHORT_TEXT_MAX,
        );
        errors.into_result()?;

        let conn = self.db.lock()?;
        let existing = load_blog(&conn, id)?;
        ensure_doctor_owns(existing.doctor_id, doctor_id)?;
        let slug = match &title {
            Some(title) if title.as_str() != existing.title => {
                Some(unique_slug(&conn, &slugify(title.as_str()), Some(id))?)
            }
            _ => None,
        };
        conn.execute(
            "UPDATE blogs SET
                title = COALESCE(?1, title),
                slug = COALESCE(?2, slug),
                content = COALESCE(?3, content),
                image = COALESCE(?4, image),
                is_published = COALESCE(?5, is_published),
                updated_at = ?6
             WHERE id = ?7",
            params![
                title.as_ref().map(|t| t.as_str()),
                slug,
                content.as_ref().map(|c| c.as_str()),
                image,
                req.is_published,
                now_timestamp(),
                id,
            ],
        )?;
        load_blog(&conn, id)
    }

    pub fn delete(&self, doctor_id: i64, id: i64) -> ClinicResult<()> {
        let conn = self.db.lock()?;
        let existing = load_blog(&conn, id)?;
        ensure_doctor_owns(existing.doctor_id, doctor_id)?;
        conn.execute("DELETE FROM blogs WHERE id = ?1", [id])?;
        tracing::info!(blog_id = id, doctor_id, "blog deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seed_doctor;

    fn post(title: &str, published: bool) -> BlogReq {
        BlogReq {
            title: Some(title.into()),
            content: Some("Drink water.".into()),
            image: None,
            is_published: Some(published),
        }
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("  Heart Health: 10 Tips!  "), "heart-health-10-tips");
        assert_eq!(slugify("???"), "post");
    }

    #[test]
    fn duplicate_titles_get_numeric_suffix() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let service = BlogService::new(db);

        let first = service.create(doctor.id, &post("Winter Flu", true)).unwrap();
        let second = service.create(doctor.id, &post("Winter flu", true)).unwrap();
        let third = service.create(doctor.id, &post("Winter  Flu!", true)).unwrap();
        assert_eq!(first.slug, "winter-flu");
        assert_eq!(second.slug, "winter-flu-2");
        assert_eq!(third.slug, "winter-flu-3");
    }

    #[test]
    fn drafts_are_hidden_from_public() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let other = seed_doctor(&db, "other@example.com");
        let service = BlogService::new(db);

        service.create(doctor.id, &post("Published", true)).unwrap();
        let draft = service.create(doctor.id, &post("Draft", false)).unwrap();

        assert_eq!(service.list_published(None).unwrap().len(), 1);
        assert_eq!(service.list_for_author(doctor.id).unwrap().len(), 2);
        assert!(matches!(
            service.get_by_slug(&draft.slug, None),
            Err(ClinicError::NotFound(_))
        ));
        assert!(matches!(
            service.get_by_slug(&draft.slug, Some(other.id)),
            Err(ClinicError::NotFound(_))
        ));
        assert!(service.get_by_slug(&draft.slug, Some(doctor.id)).is_ok());
    }

    #[test]
    fn update_renames_slug_and_checks_owner() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let other = seed_doctor(&db, "other@example.com");
        let service = BlogService::new(db);
        let created = service.create(doctor.id, &post("Old Title", false)).unwrap();

        let change = BlogReq {
            title: Some("New Title".into()),
            is_published: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            service.update(other.id, created.id, &change),
            Err(ClinicError::Forbidden)
        ));
        let updated = service.update(doctor.id, created.id, &change).unwrap();
        assert_eq!(updated.slug, "new-title");
        assert!(updated.is_published);
        assert_eq!(updated.content, "Drink water.");

        assert!(matches!(service.delete(other.id, created.id), Err(ClinicError::Forbidden)));
        service.delete(doctor.id, created.id).unwrap();
    }
}
