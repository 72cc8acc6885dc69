// src/recipe/repository.rs

//! Recipe repositories: the read-only catalog the solver queries
//!
//! Two implementations:
//! - [`MemoryRepository`]: recipes registered programmatically
//! - [`DirectoryRepository`]: TOML files under one or more directories,
//!   `<root>/<name>.toml` or `<root>/<name>/recipe.toml`, first root wins
//!
//! Every recipe is validated when loaded. A malformed recipe fails only the
//! lookups that need it.

use crate::error::{Error, Result};
use crate::recipe::format::Recipe;
use crate::recipe::parser::{parse_recipe, parse_recipe_file, validate_recipe};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Read-only catalog of recipes
pub trait RecipeRepository: Send + Sync {
    /// Load a recipe by package name
    ///
    /// Fails with [`Error::RecipeNotFound`] if there is no such recipe and
    /// [`Error::RecipeMalformed`] if it is internally inconsistent.
    fn load_recipe(&self, name: &str) -> Result<Arc<Recipe>>;

    /// Names of recipes providing a virtual package, sorted
    fn providers(&self, virtual_name: &str) -> Result<Vec<String>>;

    /// All recipe names, sorted
    fn names(&self) -> Result<Vec<String>>;

    /// Whether `name` is a virtual package rather than a recipe
    fn is_virtual(&self, name: &str) -> Result<bool> {
        match self.load_recipe(name) {
            Ok(_) => Ok(false),
            Err(Error::RecipeNotFound(_)) => Ok(!self.providers(name)?.is_empty()),
            Err(e) => Err(e),
        }
    }
}

/// Recipes held in memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    recipes: BTreeMap<String, Arc<Recipe>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a recipe, replacing any with the same name
    pub fn insert(&mut self, recipe: Recipe) -> Result<()> {
        for warning in validate_recipe(&recipe)? {
            debug!("Recipe {}: {}", recipe.name(), warning);
        }
        self.recipes.insert(recipe.name().to_string(), Arc::new(recipe));
        Ok(())
    }

    /// Parse, validate and add a TOML recipe
    pub fn insert_toml(&mut self, content: &str) -> Result<()> {
        self.insert(parse_recipe(content)?)
    }

    /// Build a repository from TOML recipes
    pub fn from_toml<'a>(contents: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut repo = Self::new();
        for content in contents {
            repo.insert_toml(content)?;
        }
        Ok(repo)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

impl RecipeRepository for MemoryRepository {
    fn load_recipe(&self, name: &str) -> Result<Arc<Recipe>> {
        self.recipes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::RecipeNotFound(name.to_string()))
    }

    fn providers(&self, virtual_name: &str) -> Result<Vec<String>> {
        Ok(self
            .recipes
            .values()
            .filter(|r| r.provides(virtual_name))
            .map(|r| r.name().to_string())
            .collect())
    }

    fn names(&self) -> Result<Vec<String>> {
        Ok(self.recipes.keys().cloned().collect())
    }
}

/// Recipes read from directories of TOML files
pub struct DirectoryRepository {
    roots: Vec<PathBuf>,
    cache: RwLock<HashMap<String, Arc<Recipe>>>,
    providers: RwLock<Option<BTreeMap<String, Vec<String>>>>,
}

impl DirectoryRepository {
    /// Create a repository over the given roots, searched in order
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            cache: RwLock::new(HashMap::new()),
            providers: RwLock::new(None),
        }
    }

    /// Directories searched for recipes
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Locate the recipe file for a package
    fn recipe_path(&self, name: &str) -> Option<PathBuf> {
        self.roots.iter().find_map(|root| {
            [root.join(format!("{}.toml", name)), root.join(name).join("recipe.toml")]
                .into_iter()
                .find(|p| p.is_file())
        })
    }

    fn load_uncached(&self, name: &str, path: &Path) -> Result<Recipe> {
        let recipe = parse_recipe_file(path).map_err(|e| match e {
            Error::RecipeMalformed { reason, .. } => Error::malformed(name, reason),
            other => other,
        })?;
        if recipe.name() != name {
            return Err(Error::malformed(
                name,
                format!(
                    "{} declares package '{}'",
                    path.display(),
                    recipe.name()
                ),
            ));
        }
        for warning in validate_recipe(&recipe)? {
            debug!("Recipe {}: {}", name, warning);
        }
        Ok(recipe)
    }

    /// Build the virtual → providers index by loading every recipe
    fn provider_index(&self) -> Result<BTreeMap<String, Vec<String>>> {
        if let Some(index) = self.providers.read().map_err(lock_poisoned)?.as_ref() {
            return Ok(index.clone());
        }

        let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in self.names()? {
            let recipe = match self.load_recipe(&name) {
                Ok(recipe) => recipe,
                Err(e) => {
                    warn!("Skipping recipe {} while indexing providers: {}", name, e);
                    continue;
                }
            };
            for provided in &recipe.package.provides {
                index.entry(provided.clone()).or_default().push(name.clone());
            }
        }
        for providers in index.values_mut() {
            providers.sort();
        }

        *self.providers.write().map_err(lock_poisoned)? = Some(index.clone());
        Ok(index)
    }
}

fn lock_poisoned<T>(_: T) -> Error {
    Error::Io(std::io::Error::other("recipe cache lock poisoned"))
}

impl RecipeRepository for DirectoryRepository {
    fn load_recipe(&self, name: &str) -> Result<Arc<Recipe>> {
        if let Some(recipe) = self.cache.read().map_err(lock_poisoned)?.get(name) {
            return Ok(Arc::clone(recipe));
        }

        let path = self
            .recipe_path(name)
            .ok_or_else(|| Error::RecipeNotFound(name.to_string()))?;
        debug!("Loading recipe {} from {}", name, path.display());
        let recipe = Arc::new(self.load_uncached(name, &path)?);

        self.cache
            .write()
            .map_err(lock_poisoned)?
            .insert(name.to_string(), Arc::clone(&recipe));
        Ok(recipe)
    }

    fn providers(&self, virtual_name: &str) -> Result<Vec<String>> {
        Ok(self
            .provider_index()?
            .get(virtual_name)
            .cloned()
            .unwrap_or_default())
    }

    fn names(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for root in &self.roots {
            if !root.is_dir() {
                continue;
            }
            for entry in fs::read_dir(root)? {
                let path = entry?.path();
                let name = if path.is_dir() && path.join("recipe.toml").is_file() {
                    path.file_name()
                } else if path.extension().is_some_and(|e| e == "toml") {
                    path.file_stem()
                } else {
                    None
                };
                if let Some(name) = name.and_then(|n| n.to_str()) {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names.into_iter().collect())
    }
}
