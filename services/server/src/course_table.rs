//! §4.2 — the in-memory course table: an associative container keyed by
//! course id holding pointers to course records, because each record
//! embeds a non-movable mutex and an atomic counter.

use cca_protocol::{CourseGroup, CourseType};
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::usem::UsemSetter;

/// A single course offering. `selected_lock` serializes the
/// compare-with-max-and-increment admission check (§9 "Compare-with-max-
/// and-increment"); plain reads of `selected` use the atomic directly.
pub struct Course {
    pub id: i64,
    pub max: u32,
    pub title: String,
    pub teacher: String,
    pub location: String,
    pub course_id: String,
    pub section_id: String,
    pub course_type: CourseType,
    pub group: CourseGroup,
    pub year_groups_bitmask: u8,
    pub selected: AtomicU32,
    pub selected_lock: Mutex<()>,
    /// Keyed by userId; installed by a connection session for every course
    /// at setup, removed at teardown. Never locked against `selected_lock`.
    pub usems: DashMap<String, UsemSetter>,
}

impl Course {
    pub fn selected_count(&self) -> u32 {
        self.selected.load(Ordering::SeqCst)
    }

    /// Wakes every subscriber's usem for this course (§9 "Cyclic
    /// ownership"; §4.7 propagation after an accepted Y/N).
    pub fn propagate_selected_update(&self) {
        for entry in self.usems.iter() {
            entry.value().set();
        }
    }
}

pub struct CourseTable {
    courses: DashMap<i64, Arc<Course>>,
    num_courses: AtomicU32,
    /// Mirrors `original_source/ws_connection.go`'s package-scope `var
    /// usemCount int64`: the sum of per-connection usem counts across every
    /// currently live connection, kept by `connection_opened`/
    /// `connection_closed` rather than the static catalog size, so the
    /// watcher pacing sleep (§4.5 step 5) scales with how many clients are
    /// actually connected.
    active_usem_count: AtomicU64,
}

pub struct CourseRow {
    pub id: i64,
    pub max: u32,
    pub title: String,
    pub teacher: String,
    pub location: String,
    pub course_id: String,
    pub section_id: String,
    pub course_type: CourseType,
    pub group: CourseGroup,
    pub year_groups_bitmask: u8,
    pub selected: u32,
}

impl CourseTable {
    pub fn empty() -> Self {
        Self {
            courses: DashMap::new(),
            num_courses: AtomicU32::new(0),
            active_usem_count: AtomicU64::new(0),
        }
    }

    /// Startup load: reads the catalog plus the count of `choices` per
    /// course to seed `selected`.
    pub async fn load_all(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let table = Self::empty();
        let rows = crate::repo::courses::load_all_with_selected_counts(pool).await?;
        table.install(rows);
        Ok(table)
    }

    fn install(&self, rows: Vec<CourseRow>) {
        self.courses.clear();
        for row in &rows {
            let course = Arc::new(Course {
                id: row.id,
                max: row.max,
                title: row.title.clone(),
                teacher: row.teacher.clone(),
                location: row.location.clone(),
                course_id: row.course_id.clone(),
                section_id: row.section_id.clone(),
                course_type: row.course_type,
                group: row.group,
                year_groups_bitmask: row.year_groups_bitmask,
                selected: AtomicU32::new(row.selected),
                selected_lock: Mutex::new(()),
                usems: DashMap::new(),
            });
            self.courses.insert(row.id, course);
        }
        self.num_courses.store(rows.len() as u32, Ordering::SeqCst);
    }

    pub fn get(&self, id: i64) -> Option<Arc<Course>> {
        self.courses.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn iter(&self) -> Vec<Arc<Course>> {
        self.courses.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub fn num_courses(&self) -> u32 {
        self.num_courses.load(Ordering::SeqCst)
    }

    /// Called once per connection setup, before its per-course usems are
    /// registered (`ws_connection.go`'s `atomic.AddInt64(&usemCount, ...)`
    /// ahead of the `courses.Range` loop).
    pub fn connection_opened(&self) {
        self.active_usem_count.fetch_add(self.num_courses() as u64, Ordering::SeqCst);
    }

    /// Called once per connection teardown, after its per-course usems are
    /// removed.
    pub fn connection_closed(&self) {
        self.active_usem_count.fetch_sub(self.num_courses() as u64, Ordering::SeqCst);
    }

    /// The live sum of per-connection usem counts across every currently
    /// connected session; read fresh on every watcher-loop sleep (§4.5 step
    /// 5), never cached at connection-setup time.
    pub fn active_usem_count(&self) -> u64 {
        self.active_usem_count.load(Ordering::SeqCst)
    }

    /// Admin catalog replacement (§4.2, §4.9): the caller has already run
    /// the transactional DB replacement; this reloads the in-memory table
    /// from the now-current database state.
    pub async fn replace_all(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        let rows = crate::repo::courses::load_all_with_selected_counts(pool).await?;
        self.install(rows);
        Ok(())
    }
}
