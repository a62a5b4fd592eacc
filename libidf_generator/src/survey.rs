// The alignment crew measures the front tubes of every eight-pack and hands
// over one comma separated table for the whole instrument. Point labels look
// like BR_D1T1B: a bank prefix, then detector (eight-pack) number, tube number
// and T(op)/B(ottom) end. Only the part after the last underscore is kept as
// the point name inside a bank.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use fxhash::FxHashMap;

use super::error::SurveyError;
use super::rectangle::{Rectangle, Vector};

/// Survey label prefixes and the bank they belong to
pub const BANK_PREFIXES: [(&str, &str); 3] = [("BR_", "bank1"), ("BL_", "bank2"), ("HA_", "bank5")];

const POINT_COLUMN: &str = "Point";
const COORDINATE_COLUMNS: [&str; 3] = ["X", "Y", "Z"];

/// Measured points, split by bank
#[derive(Debug, Clone, Default)]
pub struct Survey {
    banks: FxHashMap<String, Vec<(String, Vector)>>,
}

impl Survey {
    /// Read a survey table from a file
    pub fn read(path: &Path) -> Result<Self, SurveyError> {
        if !path.exists() {
            return Err(SurveyError::BadFilePath(path.to_path_buf()));
        }
        let mut contents = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut contents)?;
        Self::parse(&contents)
    }

    /// Parse a survey table. The first row names the columns; rows whose label
    /// carries none of the known bank prefixes are ignored.
    pub fn parse(contents: &str) -> Result<Self, SurveyError> {
        let mut lines = contents.lines().enumerate();
        let header: Vec<&str> = match lines.next() {
            Some((_, line)) => line.split_terminator(',').map(str::trim).collect(),
            None => return Err(SurveyError::MissingColumn(POINT_COLUMN)),
        };
        let column = |name: &'static str| {
            header
                .iter()
                .position(|h| *h == name)
                .ok_or(SurveyError::MissingColumn(name))
        };
        let point_col = column(POINT_COLUMN)?;
        let coord_cols = [
            column(COORDINATE_COLUMNS[0])?,
            column(COORDINATE_COLUMNS[1])?,
            column(COORDINATE_COLUMNS[2])?,
        ];
        let n_columns = header.len();

        let mut survey = Survey::default();
        for (row, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let entries: Vec<&str> = line.split_terminator(',').map(str::trim).collect();
            if entries.len() < n_columns {
                return Err(SurveyError::BadFileFormat(row + 1));
            }
            let label = entries[point_col];
            let Some(bank) = BANK_PREFIXES
                .iter()
                .find(|(prefix, _)| label.starts_with(prefix))
                .map(|(_, bank)| *bank)
            else {
                continue;
            };
            let name = label.rsplit('_').next().unwrap_or(label);
            let position = Vector::new(
                entries[coord_cols[0]].parse()?,
                entries[coord_cols[1]].parse()?,
                entries[coord_cols[2]].parse()?,
            );
            survey
                .banks
                .entry(bank.to_string())
                .or_default()
                .push((name.to_string(), position));
        }
        Ok(survey)
    }

    /// Names of the banks with at least one point
    pub fn bank_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.banks.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    pub fn point(&self, bank: &str, name: &str) -> Result<Vector, SurveyError> {
        self.banks
            .get(bank)
            .and_then(|points| points.iter().find(|(label, _)| label == name))
            .map(|(_, position)| *position)
            .ok_or_else(|| SurveyError::MissingPoint {
                bank: bank.to_string(),
                point: name.to_string(),
            })
    }

    /// Rectangle through four named points given as LL, UL, UR, LR
    pub fn rectangle(
        &self,
        bank: &str,
        corners: [&str; 4],
        tolerance: f64,
    ) -> Result<Rectangle, SurveyError> {
        let [ll, ul, ur, lr] = corners;
        Ok(Rectangle::new(
            self.point(bank, ll)?,
            self.point(bank, ul)?,
            self.point(bank, ur)?,
            self.point(bank, lr)?,
            tolerance,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "Point,X,Y,Z,L,C\n\
        BR_D1T1B,-0.5,-0.5,2.0,1.0,0\n\
        BR_D1T1T, -0.5, 0.5, 2.0,1.0,0\n\
        BR_D20T4T,0.5,0.5,2.0,1.0,0\n\
        BR_D20T1B,0.5,-0.5,2.0,1.0,0\n\
        BL_D1T1B,1.0,2.0,3.0,1.0,0\n\
        XX_ignored,9,9,9,1.0,0\n\
        \n\
        HA_D9T4T,4.0,5.0,6.0,0.7,0\n";

    #[test]
    fn test_banks_split_by_prefix() {
        let survey = Survey::parse(TABLE).unwrap();
        assert_eq!(survey.bank_names(), vec!["bank1", "bank2", "bank5"]);
        assert_eq!(survey.point("bank2", "D1T1B").unwrap(), Vector::new(1.0, 2.0, 3.0));
        assert_eq!(survey.point("bank5", "D9T4T").unwrap(), Vector::new(4.0, 5.0, 6.0));
        assert!(matches!(
            survey.point("bank1", "ignored"),
            Err(SurveyError::MissingPoint { .. })
        ));
    }

    #[test]
    fn test_rectangle_from_survey() {
        let survey = Survey::parse(TABLE).unwrap();
        let rect = survey
            .rectangle("bank1", ["D1T1B", "D1T1T", "D20T4T", "D20T1B"], 0.035)
            .unwrap();
        assert!((rect.center() - Vector::new(0.0, 0.0, 2.0)).norm() < 1e-12);
        assert!(survey
            .rectangle("bank2", ["D1T1B", "D1T1T", "D20T4T", "D20T1B"], 0.035)
            .is_err());
    }

    #[test]
    fn test_malformed_tables() {
        assert!(matches!(
            Survey::parse("Point,X,Y\nBR_A,1,2\n"),
            Err(SurveyError::MissingColumn("Z"))
        ));
        assert!(matches!(
            Survey::parse("Point,X,Y,Z\nBR_A,1,2\n"),
            Err(SurveyError::BadFileFormat(2))
        ));
        assert!(matches!(
            Survey::parse("Point,X,Y,Z\nBR_A,1,two,3\n"),
            Err(SurveyError::ParsingError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let path = Path::new("/no/such/survey.csv");
        assert!(matches!(Survey::read(path), Err(SurveyError::BadFilePath(_))));
    }
}
