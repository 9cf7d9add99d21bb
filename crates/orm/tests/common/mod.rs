//! Shared fixtures: a small solar-system domain over the in-memory driver

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loam_orm::{
    BelongsTo, BelongsToRelation, ColumnType, Database, FieldDef, FieldKind, HasMany,
    HasManyRelation, HasOne, HasOneRelation, IdGeneration, IdValue, ManyToMany,
    ManyToManyRelation, MemoryDriver, MiddlewareSet, Model, ModelCrud, ModelState,
    OptionalBelongsTo, OptionalBelongsToRelation, OrmResult, Schema, SchemaStatement,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Galaxy {
    pub id: Option<i64>,
    pub name: String,
    #[serde(skip)]
    pub stars: HasMany<Star>,
    #[serde(skip)]
    state: ModelState,
}

impl Galaxy {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            stars: HasMany::default(),
            state: ModelState::default(),
        }
    }

    pub fn stars() -> HasManyRelation<Galaxy, Star> {
        HasManyRelation::new("stars", &["galaxy_id"], |galaxy, stars| {
            galaxy.stars.set_loaded(stars)
        })
    }
}

impl Model for Galaxy {
    fn table_name() -> &'static str {
        "galaxies"
    }

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", FieldKind::Int),
            FieldDef::new("name", FieldKind::Text),
        ];
        FIELDS
    }

    fn id_value(&self) -> Option<IdValue> {
        self.id.map(IdValue::from)
    }

    fn set_id(&mut self, id: IdValue) -> OrmResult<()> {
        self.id = id.as_int();
        Ok(())
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Star {
    pub id: Option<i64>,
    pub name: String,
    pub galaxy_id: i64,
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub galaxy: BelongsTo<Galaxy>,
    #[serde(skip)]
    pub planets: HasMany<Planet>,
    #[serde(skip)]
    state: ModelState,
}

impl Star {
    pub fn new(name: &str, galaxy_id: i64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            galaxy_id,
            deleted_at: None,
            galaxy: BelongsTo::default(),
            planets: HasMany::default(),
            state: ModelState::default(),
        }
    }

    pub fn galaxy() -> BelongsToRelation<Star, Galaxy> {
        BelongsToRelation::new(&["galaxy_id"], |star, galaxy| star.galaxy.set_loaded(galaxy))
    }

    pub fn planets() -> HasManyRelation<Star, Planet> {
        HasManyRelation::new("planets", &["star_id"], |star, planets| {
            star.planets.set_loaded(planets)
        })
    }
}

impl Model for Star {
    fn table_name() -> &'static str {
        "stars"
    }

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", FieldKind::Int),
            FieldDef::new("name", FieldKind::Text),
            FieldDef::new("galaxy_id", FieldKind::Int),
            FieldDef::new("deleted_at", FieldKind::DateTime),
        ];
        FIELDS
    }

    fn id_value(&self) -> Option<IdValue> {
        self.id.map(IdValue::from)
    }

    fn set_id(&mut self, id: IdValue) -> OrmResult<()> {
        self.id = id.as_int();
        Ok(())
    }

    fn soft_delete_column() -> Option<&'static str> {
        Some("deleted_at")
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Planet {
    pub id: Option<i64>,
    pub name: String,
    pub star_id: i64,
    pub ordinal: i64,
    #[serde(skip)]
    pub star: BelongsTo<Star>,
    #[serde(skip)]
    pub tags: ManyToMany<Tag>,
    #[serde(skip)]
    pub governor: HasOne<Governor>,
    #[serde(skip)]
    pub moons: HasMany<Moon>,
    #[serde(skip)]
    state: ModelState,
}

impl Planet {
    pub fn new(name: &str, star_id: i64, ordinal: i64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            star_id,
            ordinal,
            star: BelongsTo::default(),
            tags: ManyToMany::default(),
            governor: HasOne::default(),
            moons: HasMany::default(),
            state: ModelState::default(),
        }
    }

    pub fn star() -> BelongsToRelation<Planet, Star> {
        BelongsToRelation::new(&["star_id"], |planet, star| planet.star.set_loaded(star))
    }

    pub fn tags() -> ManyToManyRelation<Planet, Tag, PlanetTag> {
        ManyToManyRelation::new(
            "tags",
            &["planet_id"],
            &["tag_id"],
            |planet, tags| planet.tags.set_loaded(tags),
            |planet, tag| PlanetTag::new(planet.id.unwrap_or_default(), tag.id.unwrap_or_default()),
        )
    }

    pub fn governor() -> HasOneRelation<Planet, Governor> {
        HasOneRelation::new("governor", &["planet_id"], |planet, governor| {
            planet.governor.set_loaded(governor)
        })
    }

    pub fn moons() -> HasManyRelation<Planet, Moon> {
        HasManyRelation::new("moons", &["planet_id"], |planet, moons| {
            planet.moons.set_loaded(moons)
        })
    }
}

impl Model for Planet {
    fn table_name() -> &'static str {
        "planets"
    }

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", FieldKind::Int),
            FieldDef::new("name", FieldKind::Text),
            FieldDef::new("star_id", FieldKind::Int),
            FieldDef::new("ordinal", FieldKind::Int),
        ];
        FIELDS
    }

    fn id_value(&self) -> Option<IdValue> {
        self.id.map(IdValue::from)
    }

    fn set_id(&mut self, id: IdValue) -> OrmResult<()> {
        self.id = id.as_int();
        Ok(())
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Option<i64>,
    pub name: String,
    #[serde(skip)]
    state: ModelState,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            state: ModelState::default(),
        }
    }
}

impl Model for Tag {
    fn table_name() -> &'static str {
        "tags"
    }

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", FieldKind::Int),
            FieldDef::new("name", FieldKind::Text),
        ];
        FIELDS
    }

    fn id_value(&self) -> Option<IdValue> {
        self.id.map(IdValue::from)
    }

    fn set_id(&mut self, id: IdValue) -> OrmResult<()> {
        self.id = id.as_int();
        Ok(())
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }
}

/// Pivot between planets and tags, with a payload column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanetTag {
    pub id: Option<i64>,
    pub planet_id: i64,
    pub tag_id: i64,
    pub comment: Option<String>,
    #[serde(skip)]
    state: ModelState,
}

impl PlanetTag {
    pub fn new(planet_id: i64, tag_id: i64) -> Self {
        Self {
            id: None,
            planet_id,
            tag_id,
            comment: None,
            state: ModelState::default(),
        }
    }
}

impl Model for PlanetTag {
    fn table_name() -> &'static str {
        "planet_tag"
    }

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", FieldKind::Int),
            FieldDef::new("planet_id", FieldKind::Int),
            FieldDef::new("tag_id", FieldKind::Int),
            FieldDef::new("comment", FieldKind::Text),
        ];
        FIELDS
    }

    fn id_value(&self) -> Option<IdValue> {
        self.id.map(IdValue::from)
    }

    fn set_id(&mut self, id: IdValue) -> OrmResult<()> {
        self.id = id.as_int();
        Ok(())
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Governor {
    pub id: Option<i64>,
    pub name: String,
    pub planet_id: i64,
    #[serde(skip)]
    state: ModelState,
}

impl Governor {
    pub fn new(name: &str, planet_id: i64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            planet_id,
            state: ModelState::default(),
        }
    }
}

impl Model for Governor {
    fn table_name() -> &'static str {
        "governors"
    }

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", FieldKind::Int),
            FieldDef::new("name", FieldKind::Text),
            FieldDef::new("planet_id", FieldKind::Int),
        ];
        FIELDS
    }

    fn id_value(&self) -> Option<IdValue> {
        self.id.map(IdValue::from)
    }

    fn set_id(&mut self, id: IdValue) -> OrmResult<()> {
        self.id = id.as_int();
        Ok(())
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }
}

/// Moon with an optional parent planet (rogue moons have none)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Moon {
    pub id: Option<i64>,
    pub name: String,
    pub planet_id: Option<i64>,
    #[serde(skip)]
    pub planet: OptionalBelongsTo<Planet>,
    #[serde(skip)]
    state: ModelState,
}

impl Moon {
    pub fn new(name: &str, planet_id: Option<i64>) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            planet_id,
            planet: OptionalBelongsTo::default(),
            state: ModelState::default(),
        }
    }

    pub fn planet() -> OptionalBelongsToRelation<Moon, Planet> {
        OptionalBelongsToRelation::new(&["planet_id"], |moon, planet| {
            moon.planet.set_loaded(planet)
        })
    }
}

impl Model for Moon {
    fn table_name() -> &'static str {
        "moons"
    }

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", FieldKind::Int),
            FieldDef::new("name", FieldKind::Text),
            FieldDef::new("planet_id", FieldKind::Int),
        ];
        FIELDS
    }

    fn id_value(&self) -> Option<IdValue> {
        self.id.map(IdValue::from)
    }

    fn set_id(&mut self, id: IdValue) -> OrmResult<()> {
        self.id = id.as_int();
        Ok(())
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }
}

/// Composite-keyed fixture: sectors are addressed by (region, index)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sector {
    pub region: String,
    pub index: i64,
    pub name: String,
    #[serde(skip)]
    state: ModelState,
}

impl Sector {
    pub fn new(region: &str, index: i64, name: &str) -> Self {
        Self {
            region: region.to_string(),
            index,
            name: name.to_string(),
            state: ModelState::default(),
        }
    }

    pub fn id(region: &str, index: i64) -> IdValue {
        IdValue::Composite(vec![
            ("region".to_string(), region.into()),
            ("index".to_string(), index.into()),
        ])
    }
}

impl Model for Sector {
    fn table_name() -> &'static str {
        "sectors"
    }

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("region", FieldKind::Text),
            FieldDef::new("index", FieldKind::Int),
            FieldDef::new("name", FieldKind::Text),
        ];
        FIELDS
    }

    fn id_columns() -> &'static [&'static str] {
        &["region", "index"]
    }

    fn id_generation() -> IdGeneration {
        IdGeneration::None
    }

    fn id_value(&self) -> Option<IdValue> {
        Some(Sector::id(&self.region, self.index))
    }

    fn set_id(&mut self, id: IdValue) -> OrmResult<()> {
        if let IdValue::Composite(parts) = id {
            for (name, value) in parts {
                match (name.as_str(), value) {
                    ("region", loam_orm::Value::String(region)) => self.region = region,
                    ("index", loam_orm::Value::Int(index)) => self.index = index,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }
}

pub struct TestDb {
    pub db: Database,
    pub driver: MemoryDriver,
}

pub async fn setup() -> TestDb {
    setup_with(MiddlewareSet::new()).await
}

pub async fn setup_with(middleware: MiddlewareSet) -> TestDb {
    let driver = MemoryDriver::new();
    let db = Database::with_middleware(Arc::new(driver.clone()), middleware);
    for statement in schema_statements() {
        db.execute_schema(&statement).await.expect("schema setup");
    }
    TestDb { db, driver }
}

pub fn schema_statements() -> Vec<SchemaStatement> {
    vec![
        Schema::create("galaxies")
            .id()
            .column("name", ColumnType::Text)
            .build(),
        Schema::create("stars")
            .id()
            .column("name", ColumnType::Text)
            .column("galaxy_id", ColumnType::Int)
            .soft_deletes()
            .foreign_key(&["galaxy_id"], "galaxies", &["id"])
            .build(),
        Schema::create("planets")
            .id()
            .column("name", ColumnType::Text)
            .column("star_id", ColumnType::Int)
            .column("ordinal", ColumnType::Int)
            .build(),
        Schema::create("tags")
            .id()
            .column("name", ColumnType::Text)
            .unique()
            .build(),
        Schema::create("planet_tag")
            .id()
            .column("planet_id", ColumnType::Int)
            .column("tag_id", ColumnType::Int)
            .column("comment", ColumnType::Text)
            .nullable()
            .build(),
        Schema::create("governors")
            .id()
            .column("name", ColumnType::Text)
            .column("planet_id", ColumnType::Int)
            .build(),
        Schema::create("moons")
            .id()
            .column("name", ColumnType::Text)
            .column("planet_id", ColumnType::Int)
            .nullable()
            .build(),
        Schema::create("sectors")
            .column("region", ColumnType::Text)
            .column("index", ColumnType::Int)
            .column("name", ColumnType::Text)
            .primary_key(&["region", "index"])
            .build(),
    ]
}

pub struct Seeded {
    pub milky_way: Galaxy,
    pub andromeda: Galaxy,
    pub sun: Star,
    pub alpha_centauri: Star,
    pub planets: Vec<Planet>,
}

/// Two galaxies, two stars, and the eight planets of the Sun
pub async fn seed(db: &Database) -> Seeded {
    let milky_way = Galaxy::create(db, Galaxy::new("Milky Way")).await.unwrap();
    let andromeda = Galaxy::create(db, Galaxy::new("Andromeda")).await.unwrap();
    let sun = Star::create(db, Star::new("Sun", milky_way.id.unwrap()))
        .await
        .unwrap();
    let alpha_centauri = Star::create(db, Star::new("Alpha Centauri", milky_way.id.unwrap()))
        .await
        .unwrap();

    let names = [
        "Mercury", "Venus", "Earth", "Mars", "Jupiter", "Saturn", "Uranus", "Neptune",
    ];
    let sun_id = sun.id.unwrap();
    let batch: Vec<Planet> = names
        .iter()
        .enumerate()
        .map(|(i, name)| Planet::new(name, sun_id, i as i64 + 1))
        .collect();
    let planets = Planet::create_all(db, batch).await.unwrap();

    Seeded {
        milky_way,
        andromeda,
        sun,
        alpha_centauri,
        planets,
    }
}

/// The planet with the given name, from a seeded set
pub fn planet_named<'a>(seeded: &'a Seeded, name: &str) -> &'a Planet {
    seeded
        .planets
        .iter()
        .find(|p| p.name == name)
        .expect("seeded planet")
}
