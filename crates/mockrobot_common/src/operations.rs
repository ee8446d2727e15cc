//! Logical operations offered to the UI and their expansion into device commands.
//!
//! The UI hands over an operation name plus two index-aligned arrays of
//! parameter names and values. [`OperationRequest::from_parallel`] folds them
//! into a single name-keyed map once, so nothing downstream ever looks a value
//! up by position.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::messages::{Command, Location};

/// High level operations the UI can request.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Pick from `Source Location`.
    Pick,
    /// Place at `Destination Location`.
    Place,
    /// Pick from `Source Location`, then place at `Destination Location`.
    Transfer,
}

impl Operation {
    /// Name used by the UI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Pick => "Pick",
            Operation::Place => "Place",
            Operation::Transfer => "Transfer",
        }
    }

    /// Parameters that must be present for this operation.
    pub fn required_parameters(&self) -> &'static [ParameterName] {
        match self {
            Operation::Pick => &[ParameterName::SourceLocation],
            Operation::Place => &[ParameterName::DestinationLocation],
            Operation::Transfer => &[
                ParameterName::SourceLocation,
                ParameterName::DestinationLocation,
            ],
        }
    }
}

impl FromStr for Operation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pick" => Ok(Operation::Pick),
            "Place" => Ok(Operation::Place),
            "Transfer" => Ok(Operation::Transfer),
            other => Err(ValidationError::UnknownOperation(other.to_string())),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter names the UI may send.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterName {
    /// `Source Location`
    SourceLocation,
    /// `Destination Location`
    DestinationLocation,
}

impl ParameterName {
    /// Name as the UI spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterName::SourceLocation => "Source Location",
            ParameterName::DestinationLocation => "Destination Location",
        }
    }
}

impl FromStr for ParameterName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Source Location" => Ok(ParameterName::SourceLocation),
            "Destination Location" => Ok(ParameterName::DestinationLocation),
            other => Err(ValidationError::UnknownParameter(other.to_string())),
        }
    }
}

impl Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated operation with its parameters keyed by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationRequest {
    operation: Operation,
    parameters: BTreeMap<ParameterName, Location>,
}

impl OperationRequest {
    /// Builds a request from the UI's parallel arrays.
    ///
    /// Checks, in order: operation name, array lengths, each name (known, not
    /// repeated), each value (integer inside `locations`), then that every
    /// parameter the operation requires is present. The first problem found is
    /// returned.
    pub fn from_parallel<N, V>(
        operation: &str,
        names: &[N],
        values: &[V],
        locations: &RangeInclusive<i64>,
    ) -> Result<Self, ValidationError>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let operation: Operation = operation.parse()?;

        if names.len() != values.len() {
            return Err(ValidationError::MismatchedParameters {
                names: names.len(),
                values: values.len(),
            });
        }

        let mut parameters = BTreeMap::new();
        for (name, value) in names.iter().zip(values) {
            let name: ParameterName = name.as_ref().parse()?;
            let location = parse_location(name, value.as_ref(), locations)?;
            if parameters.insert(name, location).is_some() {
                return Err(ValidationError::DuplicateParameter(name.as_str()));
            }
        }

        Self::new(operation, parameters)
    }

    /// Builds a request from an already keyed map.
    pub fn new(
        operation: Operation,
        parameters: BTreeMap<ParameterName, Location>,
    ) -> Result<Self, ValidationError> {
        if let Some(missing) = operation
            .required_parameters()
            .iter()
            .find(|name| !parameters.contains_key(*name))
        {
            return Err(ValidationError::MissingParameter {
                operation: operation.as_str(),
                name: missing.as_str(),
            });
        }

        Ok(Self {
            operation,
            parameters,
        })
    }

    /// The validated operation.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Looks a parameter up by name.
    pub fn get(&self, name: ParameterName) -> Option<Location> {
        self.parameters.get(&name).copied()
    }

    /// Expands the request into the commands to run, in order.
    ///
    /// A Transfer always yields pick then place, whatever order the UI listed
    /// the parameters in.
    pub fn translate(&self) -> Vec<Command> {
        // Presence of required parameters is checked at construction.
        let source = || self.get(ParameterName::SourceLocation);
        let destination = || self.get(ParameterName::DestinationLocation);

        match self.operation {
            Operation::Pick => source().map(Command::Pick).into_iter().collect(),
            Operation::Place => destination().map(Command::Place).into_iter().collect(),
            Operation::Transfer => source()
                .map(Command::Pick)
                .into_iter()
                .chain(destination().map(Command::Place))
                .collect(),
        }
    }
}

fn parse_location(
    name: ParameterName,
    value: &str,
    locations: &RangeInclusive<i64>,
) -> Result<Location, ValidationError> {
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidValue {
            name: name.as_str(),
            value: value.to_string(),
        })?;

    if !locations.contains(&parsed) {
        return Err(ValidationError::LocationOutOfRange {
            name: name.as_str(),
            value: parsed,
            min: *locations.start(),
            max: *locations.end(),
        });
    }

    Ok(Location(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANGE: RangeInclusive<i64> = 1..=17;

    fn request(operation: &str, names: &[&str], values: &[&str]) -> Result<OperationRequest, ValidationError> {
        OperationRequest::from_parallel(operation, names, values, &RANGE)
    }

    #[test]
    fn pick_and_place_expand_to_one_command() {
        let pick = request("Pick", &["Source Location"], &["10"]).unwrap();
        assert_eq!(pick.translate(), vec![Command::Pick(Location(10))]);

        let place = request("Place", &["Destination Location"], &["5"]).unwrap();
        assert_eq!(place.translate(), vec![Command::Place(Location(5))]);
    }

    #[test]
    fn transfer_lookup_ignores_array_order() {
        let a = request(
            "Transfer",
            &["Destination Location", "Source Location"],
            &["5", "12"],
        )
        .unwrap();
        let b = request(
            "Transfer",
            &["Source Location", "Destination Location"],
            &["12", "5"],
        )
        .unwrap();

        let expected = vec![Command::Pick(Location(12)), Command::Place(Location(5))];
        assert_eq!(a.translate(), expected);
        assert_eq!(b.translate(), expected);
        assert_eq!(a, b);
    }

    #[test]
    fn extra_parameters_are_ignored_by_single_step_operations() {
        let pick = request(
            "Pick",
            &["Destination Location", "Source Location"],
            &["3", "4"],
        )
        .unwrap();
        assert_eq!(pick.translate(), vec![Command::Pick(Location(4))]);
    }

    #[test]
    fn unknown_operation_is_rejected() {
        assert_eq!(
            request("Make smoothie", &["Source Location"], &["1"]),
            Err(ValidationError::UnknownOperation("Make smoothie".into()))
        );
        // Names are case sensitive, as the UI sends them verbatim.
        assert!(request("pick", &["Source Location"], &["1"]).is_err());
    }

    #[test]
    fn missing_parameters_are_named() {
        assert_eq!(
            request("Transfer", &["Source Location"], &["12"]),
            Err(ValidationError::MissingParameter {
                operation: "Transfer",
                name: "Destination Location",
            })
        );
        assert_eq!(
            request("Pick", &[], &[]),
            Err(ValidationError::MissingParameter {
                operation: "Pick",
                name: "Source Location",
            })
        );
    }

    #[test]
    fn malformed_parameters_are_rejected() {
        assert_eq!(
            request("Transfer", &["Source", "Destination"], &["12", "5"]),
            Err(ValidationError::UnknownParameter("Source".into()))
        );
        assert_eq!(
            request("Pick", &["Source Location", "Source Location"], &["1", "2"]),
            Err(ValidationError::DuplicateParameter("Source Location"))
        );
        assert_eq!(
            request("Pick", &["Source Location"], &["ten"]),
            Err(ValidationError::InvalidValue {
                name: "Source Location",
                value: "ten".into(),
            })
        );
        assert_eq!(
            request("Transfer", &["Source Location", "Destination Location"], &["122", "5"]),
            Err(ValidationError::LocationOutOfRange {
                name: "Source Location",
                value: 122,
                min: 1,
                max: 17,
            })
        );
        assert_eq!(
            request("Pick", &["Source Location"], &["1", "2"]),
            Err(ValidationError::MismatchedParameters { names: 1, values: 2 })
        );
    }
}
