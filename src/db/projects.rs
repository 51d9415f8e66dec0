use super::session::{Entity, UnitOfWork};
use crate::libs::error::{Error, Result};
use crate::libs::project::{Project, ProjectType};
use rusqlite::{params, Connection, OptionalExtension, Row};

const INSERT_PROJECT_TYPE: &str = "INSERT INTO projecttype (name) VALUES (?1)";
const SELECT_PROJECT_TYPE: &str = "SELECT name FROM projecttype WHERE name = ?1";
const SELECT_ALL_PROJECT_TYPES: &str = "SELECT name FROM projecttype ORDER BY name";
const DELETE_PROJECT_TYPE: &str = "DELETE FROM projecttype WHERE name = ?1";
const INSERT_PROJECT: &str = "INSERT INTO project (title, projecttype) VALUES (?1, ?2)";
const UPSERT_PROJECT: &str = "INSERT INTO project (title, projecttype) VALUES (?1, ?2)
    ON CONFLICT(title) DO UPDATE SET projecttype = excluded.projecttype";
const SELECT_PROJECT: &str = "SELECT title, projecttype FROM project WHERE title = ?1";
const SELECT_ALL_PROJECTS: &str = "SELECT title, projecttype FROM project ORDER BY title";
const DELETE_PROJECT: &str = "DELETE FROM project WHERE title = ?1";

/// Projects and project types. Both catalogs only grow in normal use.
pub struct Projects<'a> {
    conn: &'a Connection,
}

impl<'a> Projects<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Project> {
        Ok(Project {
            title: row.get(0)?,
            project_type: row.get::<_, Option<String>>(1)?.map(ProjectType::new),
        })
    }

    pub fn get(&self, title: &str) -> Result<Option<Project>> {
        Ok(self.conn.query_row(SELECT_PROJECT, params![title], Self::from_row).optional()?)
    }

    pub fn list(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(SELECT_ALL_PROJECTS)?;
        let projects = stmt.query_map([], Self::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(projects)
    }

    /// Inserts a new project. An existing title is a [`Error::Conflict`].
    pub fn create(&self, project: &Project) -> Result<()> {
        let kind = project.project_type.as_ref().map(|t| t.name.as_str());
        self.conn
            .execute(INSERT_PROJECT, params![project.title, kind])
            .map_err(|e| Error::on_insert(e, "Project", &project.title))?;
        Ok(())
    }

    pub fn save(&self, project: &Project) -> Result<()> {
        if let Some(kind) = &project.project_type {
            self.get_or_create_type(&kind.name)?;
        }
        let kind = project.project_type.as_ref().map(|t| t.name.as_str());
        self.conn.execute(UPSERT_PROJECT, params![project.title, kind])?;
        Ok(())
    }

    pub fn delete(&self, title: &str) -> Result<()> {
        self.conn.execute(DELETE_PROJECT, params![title])?;
        Ok(())
    }

    pub fn get_type(&self, name: &str) -> Result<Option<ProjectType>> {
        Ok(self
            .conn
            .query_row(SELECT_PROJECT_TYPE, params![name], |row| row.get::<_, String>(0).map(ProjectType::new))
            .optional()?)
    }

    pub fn list_types(&self) -> Result<Vec<ProjectType>> {
        let mut stmt = self.conn.prepare(SELECT_ALL_PROJECT_TYPES)?;
        let types = stmt
            .query_map([], |row| row.get::<_, String>(0).map(ProjectType::new))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(types)
    }

    pub fn create_type(&self, kind: &ProjectType) -> Result<()> {
        self.conn
            .execute(INSERT_PROJECT_TYPE, params![kind.name])
            .map_err(|e| Error::on_insert(e, "ProjectType", &kind.name))?;
        Ok(())
    }

    pub fn get_or_create_type(&self, name: &str) -> Result<ProjectType> {
        match self.get_type(name)? {
            Some(kind) => Ok(kind),
            None => {
                let kind = ProjectType::new(name);
                self.create_type(&kind)?;
                Ok(kind)
            }
        }
    }

    /// Looks the project up by title, creating it and its type if unknown.
    /// The lookup and the insert must share one transaction; a concurrent
    /// creator that slips in between surfaces as [`Error::Conflict`].
    pub fn get_or_create(&self, title: &str, kind: &str) -> Result<Project> {
        if let Some(project) = self.get(title)? {
            return Ok(project);
        }
        let project = Project::new(self.get_or_create_type(kind)?, title);
        self.create(&project)?;
        Ok(project)
    }
}

impl Entity for Project {
    type Key = str;

    fn find(uow: &UnitOfWork, key: &str) -> Result<Option<Self>> {
        Projects::new(uow.conn()).get(key)
    }

    fn find_all(uow: &UnitOfWork) -> Result<Vec<Self>> {
        Projects::new(uow.conn()).list()
    }

    fn persist(&mut self, uow: &UnitOfWork) -> Result<()> {
        Projects::new(uow.conn()).save(self)
    }

    fn delete(&self, uow: &UnitOfWork) -> Result<()> {
        Projects::new(uow.conn()).delete(&self.title)
    }
}

impl Entity for ProjectType {
    type Key = str;

    fn find(uow: &UnitOfWork, key: &str) -> Result<Option<Self>> {
        Projects::new(uow.conn()).get_type(key)
    }

    fn find_all(uow: &UnitOfWork) -> Result<Vec<Self>> {
        Projects::new(uow.conn()).list_types()
    }

    fn persist(&mut self, uow: &UnitOfWork) -> Result<()> {
        Projects::new(uow.conn()).get_or_create_type(&self.name).map(|_| ())
    }

    fn delete(&self, uow: &UnitOfWork) -> Result<()> {
        uow.conn().execute(DELETE_PROJECT_TYPE, params![self.name])?;
        Ok(())
    }
}
