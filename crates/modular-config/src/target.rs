//! Output syntax level for emitted JavaScript.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// ECMAScript syntax level the emitted code must run on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EsTarget {
    Es2015,
    Es2016,
    Es2017,
    Es2018,
    Es2019,
    #[default]
    Es2020,
    Es2021,
    Es2022,
    EsNext,
}

impl EsTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            EsTarget::Es2015 => "es2015",
            EsTarget::Es2016 => "es2016",
            EsTarget::Es2017 => "es2017",
            EsTarget::Es2018 => "es2018",
            EsTarget::Es2019 => "es2019",
            EsTarget::Es2020 => "es2020",
            EsTarget::Es2021 => "es2021",
            EsTarget::Es2022 => "es2022",
            EsTarget::EsNext => "esnext",
        }
    }

    /// `async` functions and `await` expressions are native from ES2017.
    pub fn supports_async_await(&self) -> bool {
        *self >= EsTarget::Es2017
    }

    /// Top-level `await` in modules is native from ES2022.
    pub fn supports_top_level_await(&self) -> bool {
        *self >= EsTarget::Es2022
    }
}

impl fmt::Display for EsTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EsTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "es6" | "es2015" => Ok(EsTarget::Es2015),
            "es2016" => Ok(EsTarget::Es2016),
            "es2017" => Ok(EsTarget::Es2017),
            "es2018" => Ok(EsTarget::Es2018),
            "es2019" => Ok(EsTarget::Es2019),
            "es2020" => Ok(EsTarget::Es2020),
            "es2021" => Ok(EsTarget::Es2021),
            "es2022" => Ok(EsTarget::Es2022),
            "esnext" | "latest" => Ok(EsTarget::EsNext),
            other => Err(ConfigError::InvalidValue {
                field: "target".to_string(),
                hint: format!("unknown syntax level '{other}', expected es2015..es2022 or esnext"),
            }),
        }
    }
}
